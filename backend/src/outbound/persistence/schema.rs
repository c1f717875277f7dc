//! Diesel table definitions. Must match `backend/migrations`.
//!
//! The optional PostGIS `geom` column on `cities` is deliberately absent;
//! spatial queries go through raw SQL.

diesel::table! {
    /// Reference cities keyed by `(name, country)`.
    cities (id) {
        id -> Int8,
        name -> Text,
        country -> Text,
        state -> Nullable<Text>,
        latitude -> Float8,
        longitude -> Float8,
        population -> Nullable<Int8>,
        is_major_city -> Bool,
        timezone -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Latest analysis bundle per rounded coordinate.
    analysis_bundles (coordinate_key) {
        coordinate_key -> Text,
        latitude -> Float8,
        longitude -> Float8,
        strategy -> Text,
        payload -> Jsonb,
        generated_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
