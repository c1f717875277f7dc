//! Helper macro for declaring port error enums.
//!
//! Every variant becomes a `thiserror` variant with a display message, and a
//! snake_case constructor accepting `impl Into<_>` for each field.

macro_rules! define_port_error {
    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            #[doc = "Construct the `" $variant "` variant."]
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),* $(,)? } => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $($field : $ty),* },
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant { $($field : $ty),* });
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor and display coverage for generated port errors.

    define_port_error! {
        pub enum ProbeError {
            Unreachable { message: String } => "probe unreachable: {message}",
            Throttled { retry_after_secs: u64 } => "probe throttled for {retry_after_secs}s",
            Rejected { message: String, status: u16 } => "probe rejected ({status}): {message}",
        }
    }

    #[test]
    fn string_fields_accept_borrowed_input() {
        let err = ProbeError::unreachable("dns lookup failed");
        assert_eq!(err.to_string(), "probe unreachable: dns lookup failed");
    }

    #[test]
    fn numeric_fields_keep_their_type() {
        let err = ProbeError::throttled(30_u64);
        assert_eq!(err, ProbeError::Throttled { retry_after_secs: 30 });
        assert_eq!(err.to_string(), "probe throttled for 30s");
    }

    #[test]
    fn mixed_fields_render_in_declared_order() {
        let err = ProbeError::rejected("quota", 429_u16);
        assert_eq!(err.to_string(), "probe rejected (429): quota");
    }
}
