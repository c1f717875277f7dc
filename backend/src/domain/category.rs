//! Facility categories, provider tag mapping, and request grouping.
//!
//! The catalogue is a static table checked once at start-up by
//! [`CategoryCatalogue::validate`]. Handing out a [`CategoryCatalogue`] value
//! only after validation means the classifier never sees an inconsistent
//! table.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Upper bound on provider calls per radius tier.
pub const MAX_GROUPS: usize = 4;

/// A facility class reported on points of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityCategory {
    School,
    University,
    Hospital,
    Pharmacy,
    Police,
    FireStation,
    Bank,
    PostOffice,
    GovernmentOffice,
    Library,
    Supermarket,
    ShoppingMall,
    Restaurant,
    FuelStation,
    TransitStation,
    PlaceOfWorship,
    Park,
    TouristAttraction,
    /// Catch-all for places that match no known tag or keyword. Never
    /// requestable.
    Other,
}

impl FacilityCategory {
    /// Every category a caller may request.
    pub const SEARCHABLE: [Self; 18] = [
        Self::School,
        Self::University,
        Self::Hospital,
        Self::Pharmacy,
        Self::Police,
        Self::FireStation,
        Self::Bank,
        Self::PostOffice,
        Self::GovernmentOffice,
        Self::Library,
        Self::Supermarket,
        Self::ShoppingMall,
        Self::Restaurant,
        Self::FuelStation,
        Self::TransitStation,
        Self::PlaceOfWorship,
        Self::Park,
        Self::TouristAttraction,
    ];

    /// Snake-case identifier used in requests, cache keys, and output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::School => "school",
            Self::University => "university",
            Self::Hospital => "hospital",
            Self::Pharmacy => "pharmacy",
            Self::Police => "police",
            Self::FireStation => "fire_station",
            Self::Bank => "bank",
            Self::PostOffice => "post_office",
            Self::GovernmentOffice => "government_office",
            Self::Library => "library",
            Self::Supermarket => "supermarket",
            Self::ShoppingMall => "shopping_mall",
            Self::Restaurant => "restaurant",
            Self::FuelStation => "fuel_station",
            Self::TransitStation => "transit_station",
            Self::PlaceOfWorship => "place_of_worship",
            Self::Park => "park",
            Self::TouristAttraction => "tourist_attraction",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FacilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a category name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown facility category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for FacilityCategory {
    type Err = UnknownCategory;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_ascii_lowercase();
        Self::SEARCHABLE
            .into_iter()
            .chain(std::iter::once(Self::Other))
            .find(|category| category.as_str() == needle)
            .ok_or_else(|| UnknownCategory(value.to_owned()))
    }
}

/// Provider place types for each searchable category.
const CATEGORY_TAGS: &[(FacilityCategory, &[&str])] = &[
    (
        FacilityCategory::School,
        &["school", "primary_school", "secondary_school", "preschool"],
    ),
    (FacilityCategory::University, &["university"]),
    (FacilityCategory::Hospital, &["hospital", "doctor", "medical_lab"]),
    (FacilityCategory::Pharmacy, &["pharmacy", "drugstore"]),
    (FacilityCategory::Police, &["police"]),
    (FacilityCategory::FireStation, &["fire_station"]),
    (FacilityCategory::Bank, &["bank", "atm"]),
    (FacilityCategory::PostOffice, &["post_office"]),
    (
        FacilityCategory::GovernmentOffice,
        &["local_government_office", "city_hall", "courthouse"],
    ),
    (FacilityCategory::Library, &["library"]),
    (FacilityCategory::Supermarket, &["supermarket", "grocery_store"]),
    (FacilityCategory::ShoppingMall, &["shopping_mall"]),
    (FacilityCategory::Restaurant, &["restaurant", "cafe"]),
    (FacilityCategory::FuelStation, &["gas_station"]),
    (
        FacilityCategory::TransitStation,
        &["bus_station", "train_station", "transit_station"],
    ),
    (
        FacilityCategory::PlaceOfWorship,
        &["hindu_temple", "church", "mosque", "synagogue"],
    ),
    (FacilityCategory::Park, &["park", "national_park"]),
    (FacilityCategory::TouristAttraction, &["tourist_attraction", "museum"]),
];

/// Name and tag keywords used when no provider tag matches. Order matters:
/// the first hit wins.
const KEYWORD_HINTS: &[(&str, FacilityCategory)] = &[
    ("university", FacilityCategory::University),
    ("campus", FacilityCategory::University),
    ("vidyalaya", FacilityCategory::School),
    ("college", FacilityCategory::School),
    ("school", FacilityCategory::School),
    ("hospital", FacilityCategory::Hospital),
    ("clinic", FacilityCategory::Hospital),
    ("pharmacy", FacilityCategory::Pharmacy),
    ("police", FacilityCategory::Police),
    ("bank", FacilityCategory::Bank),
    ("post office", FacilityCategory::PostOffice),
    ("divisional secretariat", FacilityCategory::GovernmentOffice),
    ("kachcheri", FacilityCategory::GovernmentOffice),
    ("library", FacilityCategory::Library),
    ("supermarket", FacilityCategory::Supermarket),
    ("mall", FacilityCategory::ShoppingMall),
    ("restaurant", FacilityCategory::Restaurant),
    ("filling station", FacilityCategory::FuelStation),
    ("fuel", FacilityCategory::FuelStation),
    ("railway", FacilityCategory::TransitStation),
    ("bus stand", FacilityCategory::TransitStation),
    ("vihara", FacilityCategory::PlaceOfWorship),
    ("kovil", FacilityCategory::PlaceOfWorship),
    ("temple", FacilityCategory::PlaceOfWorship),
    ("church", FacilityCategory::PlaceOfWorship),
    ("mosque", FacilityCategory::PlaceOfWorship),
    ("park", FacilityCategory::Park),
];

/// A named set of categories fetched with a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    name: String,
    categories: Vec<FacilityCategory>,
}

impl CategoryGroup {
    /// Build a group.
    pub fn new(name: impl Into<String>, categories: Vec<FacilityCategory>) -> Self {
        Self {
            name: name.into(),
            categories,
        }
    }

    /// Group label used in logs.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Member categories.
    pub fn categories(&self) -> &[FacilityCategory] {
        &self.categories
    }
}

/// Partition of the searchable categories into at most [`MAX_GROUPS`]
/// provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGrouping {
    groups: Vec<CategoryGroup>,
}

/// The provider query derived from one group for a particular request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSearch {
    /// Group label.
    pub name: String,
    /// Requested categories covered by this call.
    pub categories: BTreeSet<FacilityCategory>,
    /// Sorted, de-duplicated provider types sent upstream.
    pub type_tags: Vec<String>,
}

impl CategoryGrouping {
    /// Build a grouping from explicit groups. Checked by
    /// [`CategoryCatalogue::validate`].
    pub fn new(groups: Vec<CategoryGroup>) -> Self {
        Self { groups }
    }

    /// Four thematic groups.
    pub fn standard() -> Self {
        use FacilityCategory as C;
        Self::new(vec![
            CategoryGroup::new(
                "essential_services",
                vec![C::Hospital, C::Pharmacy, C::Police, C::FireStation],
            ),
            CategoryGroup::new(
                "education_government",
                vec![C::School, C::University, C::GovernmentOffice, C::PostOffice, C::Library],
            ),
            CategoryGroup::new(
                "commercial",
                vec![
                    C::Bank,
                    C::Supermarket,
                    C::ShoppingMall,
                    C::Restaurant,
                    C::FuelStation,
                    C::TransitStation,
                ],
            ),
            CategoryGroup::new(
                "religious_recreation",
                vec![C::PlaceOfWorship, C::Park, C::TouristAttraction],
            ),
        ])
    }

    /// Two broad groups for the cheapest strategy.
    pub fn consolidated() -> Self {
        use FacilityCategory as C;
        Self::new(vec![
            CategoryGroup::new(
                "services_and_education",
                vec![
                    C::Hospital,
                    C::Pharmacy,
                    C::Police,
                    C::FireStation,
                    C::School,
                    C::University,
                    C::GovernmentOffice,
                    C::PostOffice,
                    C::Library,
                ],
            ),
            CategoryGroup::new(
                "commerce_and_leisure",
                vec![
                    C::Bank,
                    C::Supermarket,
                    C::ShoppingMall,
                    C::Restaurant,
                    C::FuelStation,
                    C::TransitStation,
                    C::PlaceOfWorship,
                    C::Park,
                    C::TouristAttraction,
                ],
            ),
        ])
    }

    /// Configured groups.
    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    /// Provider calls needed for `requested`, skipping groups with no
    /// requested member.
    pub fn plan(&self, requested: &BTreeSet<FacilityCategory>) -> Vec<GroupSearch> {
        self.groups
            .iter()
            .filter_map(|group| {
                let categories: BTreeSet<_> = group
                    .categories
                    .iter()
                    .copied()
                    .filter(|category| requested.contains(category))
                    .collect();
                if categories.is_empty() {
                    return None;
                }
                let type_tags: BTreeSet<String> = categories
                    .iter()
                    .flat_map(|category| tags_for(*category).iter())
                    .map(|tag| (*tag).to_owned())
                    .collect();
                Some(GroupSearch {
                    name: group.name.clone(),
                    categories,
                    type_tags: type_tags.into_iter().collect(),
                })
            })
            .collect()
    }
}

fn tags_for(category: FacilityCategory) -> &'static [&'static str] {
    CATEGORY_TAGS
        .iter()
        .find(|(candidate, _)| *candidate == category)
        .map_or(&[], |(_, tags)| tags)
}

/// Inconsistencies detected in the category tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogueError {
    /// A searchable category has no provider tag.
    #[error("category `{0}` has no provider tags")]
    MissingTags(FacilityCategory),
    /// A provider tag is claimed by two categories.
    #[error("provider tag `{tag}` maps to both `{first}` and `{second}`")]
    AmbiguousTag {
        tag: String,
        first: FacilityCategory,
        second: FacilityCategory,
    },
    /// The grouping has more groups than the per-tier call budget allows.
    #[error("grouping has {0} groups; at most {MAX_GROUPS} are allowed")]
    TooManyGroups(usize),
    /// A group has no members.
    #[error("group `{0}` is empty")]
    EmptyGroup(String),
    /// A category appears in no group.
    #[error("category `{0}` is not assigned to any group")]
    Ungrouped(FacilityCategory),
    /// A category appears in more than one group, or the catch-all is grouped.
    #[error("category `{0}` is assigned to more than one group or must not be grouped")]
    MisGrouped(FacilityCategory),
}

/// How a provider place maps onto the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Resolved category.
    pub category: FacilityCategory,
    /// Most specific provider tag behind the decision, if any.
    pub subcategory: Option<String>,
}

/// Validated tag table. Obtain one through [`CategoryCatalogue::validate`].
#[derive(Debug, Clone)]
pub struct CategoryCatalogue {
    by_tag: HashMap<&'static str, FacilityCategory>,
}

impl CategoryCatalogue {
    /// Check the static tag table and `grouping` for consistency.
    pub fn validate(grouping: &CategoryGrouping) -> Result<Self, CatalogueError> {
        let mut by_tag = HashMap::new();
        for category in FacilityCategory::SEARCHABLE {
            let tags = tags_for(category);
            if tags.is_empty() {
                return Err(CatalogueError::MissingTags(category));
            }
            for tag in tags {
                if let Some(first) = by_tag.insert(*tag, category) {
                    return Err(CatalogueError::AmbiguousTag {
                        tag: (*tag).to_owned(),
                        first,
                        second: category,
                    });
                }
            }
        }

        let groups = grouping.groups();
        if groups.len() > MAX_GROUPS {
            return Err(CatalogueError::TooManyGroups(groups.len()));
        }
        let mut seen = BTreeSet::new();
        for group in groups {
            if group.categories().is_empty() {
                return Err(CatalogueError::EmptyGroup(group.name().to_owned()));
            }
            for category in group.categories() {
                if *category == FacilityCategory::Other || !seen.insert(*category) {
                    return Err(CatalogueError::MisGrouped(*category));
                }
            }
        }
        if let Some(missing) = FacilityCategory::SEARCHABLE
            .into_iter()
            .find(|category| !seen.contains(category))
        {
            return Err(CatalogueError::Ungrouped(missing));
        }

        Ok(Self { by_tag })
    }

    /// Category owning a provider tag.
    pub fn category_for_tag(&self, tag: &str) -> Option<FacilityCategory> {
        self.by_tag.get(tag).copied()
    }

    /// Classify a provider place.
    ///
    /// Tag matches in `requested` win over other tag matches; with no tag
    /// match the tags and then the name are scanned for keywords; anything
    /// left is [`FacilityCategory::Other`].
    pub fn classify(
        &self,
        type_tags: &[String],
        name: &str,
        requested: &BTreeSet<FacilityCategory>,
    ) -> Classification {
        let matches: Vec<(FacilityCategory, &String)> = type_tags
            .iter()
            .filter_map(|tag| self.category_for_tag(tag).map(|category| (category, tag)))
            .collect();

        let chosen = matches
            .iter()
            .find(|(category, _)| requested.contains(category))
            .or_else(|| matches.first());
        if let Some((category, tag)) = chosen {
            return Classification {
                category: *category,
                subcategory: Some((*tag).clone()),
            };
        }

        let haystacks = type_tags.iter().map(String::as_str).chain(std::iter::once(name));
        for haystack in haystacks {
            let words = words(haystack);
            if let Some((_, category)) = KEYWORD_HINTS
                .iter()
                .find(|(keyword, _)| contains_phrase(&words, keyword))
            {
                return Classification {
                    category: *category,
                    subcategory: type_tags.first().cloned(),
                };
            }
        }

        Classification {
            category: FacilityCategory::Other,
            subcategory: type_tags.first().cloned(),
        }
    }
}

/// Lower-cased alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `phrase` occurs in `words` as whole, consecutive words.
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    !needle.is_empty()
        && words
            .windows(needle.len())
            .any(|window| window.iter().zip(&needle).all(|(word, part)| word == part))
}

#[cfg(test)]
mod tests {
    //! Catalogue validation and classification rules.

    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn catalogue() -> CategoryCatalogue {
        CategoryCatalogue::validate(&CategoryGrouping::standard()).expect("static tables are consistent")
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_owned()).collect()
    }

    #[rstest]
    #[case(CategoryGrouping::standard())]
    #[case(CategoryGrouping::consolidated())]
    fn shipped_groupings_validate(#[case] grouping: CategoryGrouping) {
        assert!(CategoryCatalogue::validate(&grouping).is_ok());
    }

    #[test]
    fn grouping_must_cover_every_category() {
        let mut groups = CategoryGrouping::standard().groups().to_vec();
        groups.pop();
        let err = CategoryCatalogue::validate(&CategoryGrouping::new(groups)).expect_err("missing group");
        assert!(matches!(err, CatalogueError::Ungrouped(_)));
    }

    #[test]
    fn grouping_rejects_duplicates() {
        let mut groups = CategoryGrouping::standard().groups().to_vec();
        groups.push(CategoryGroup::new("again", vec![FacilityCategory::School]));
        let err = CategoryCatalogue::validate(&CategoryGrouping::new(groups)).expect_err("too many");
        assert_eq!(err, CatalogueError::TooManyGroups(5));
    }

    #[test]
    fn grouping_rejects_catch_all() {
        let grouping = CategoryGrouping::new(vec![CategoryGroup::new(
            "everything",
            FacilityCategory::SEARCHABLE
                .into_iter()
                .chain(std::iter::once(FacilityCategory::Other))
                .collect(),
        )]);
        let err = CategoryCatalogue::validate(&grouping).expect_err("other grouped");
        assert_eq!(err, CatalogueError::MisGrouped(FacilityCategory::Other));
    }

    #[test]
    fn plan_skips_groups_without_requested_members() {
        let requested = BTreeSet::from([FacilityCategory::School, FacilityCategory::Hospital]);
        let plan = CategoryGrouping::standard().plan(&requested);
        let names: Vec<_> = plan.iter().map(|search| search.name.as_str()).collect();
        assert_eq!(names, ["essential_services", "education_government"]);
        assert!(plan[1].type_tags.contains(&"primary_school".to_owned()));
        assert!(!plan[1].type_tags.contains(&"university".to_owned()));
    }

    #[rstest]
    fn requested_category_wins_over_first_tag(catalogue: CategoryCatalogue) {
        let requested = BTreeSet::from([FacilityCategory::Pharmacy]);
        let result = catalogue.classify(&tags(&["hospital", "pharmacy"]), "Asiri", &requested);
        assert_eq!(result.category, FacilityCategory::Pharmacy);
        assert_eq!(result.subcategory.as_deref(), Some("pharmacy"));
    }

    #[rstest]
    fn first_tag_used_when_nothing_requested_matches(catalogue: CategoryCatalogue) {
        let requested = BTreeSet::from([FacilityCategory::Bank]);
        let result = catalogue.classify(&tags(&["hospital", "pharmacy"]), "Asiri", &requested);
        assert_eq!(result.category, FacilityCategory::Hospital);
    }

    #[rstest]
    #[case(&["establishment"], "Royal College", FacilityCategory::School)]
    #[case(&["point_of_interest"], "Gangaramaya Temple", FacilityCategory::PlaceOfWorship)]
    #[case(&["establishment"], "Sri Ponnambalavaneswaram Kovil", FacilityCategory::PlaceOfWorship)]
    #[case(&["point_of_interest"], "Viharamahadevi Park", FacilityCategory::Park)]
    #[case(&["establishment"], "Parkview Residencies", FacilityCategory::Other)]
    #[case(&["establishment"], "Bankshall Street Stores", FacilityCategory::Other)]
    #[case(&["establishment"], "Pettah Central Bus Stand", FacilityCategory::TransitStation)]
    #[case(&["divisional_secretariat"], "Thimbirigasyaya", FacilityCategory::GovernmentOffice)]
    #[case(&["establishment"], "Unnamed Building", FacilityCategory::Other)]
    fn keyword_guess_applies_without_tag_match(
        catalogue: CategoryCatalogue,
        #[case] raw_tags: &[&str],
        #[case] name: &str,
        #[case] expected: FacilityCategory,
    ) {
        let result = catalogue.classify(&tags(raw_tags), name, &BTreeSet::new());
        assert_eq!(result.category, expected);
    }

    #[rstest]
    #[case("school", Ok(FacilityCategory::School))]
    #[case(" Fire_Station ", Ok(FacilityCategory::FireStation))]
    #[case("spaceport", Err(UnknownCategory("spaceport".to_owned())))]
    fn parses_category_names(
        #[case] raw: &str,
        #[case] expected: Result<FacilityCategory, UnknownCategory>,
    ) {
        assert_eq!(raw.parse::<FacilityCategory>(), expected);
    }
}
