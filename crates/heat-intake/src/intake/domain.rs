use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Relationship between the visitor and the property being assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyRelationship {
    Homeowner,
    Tenant,
    Landlord,
    Other,
}

impl PropertyRelationship {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homeowner => "homeowner",
            Self::Tenant => "tenant",
            Self::Landlord => "landlord",
            Self::Other => "other",
        }
    }
}

/// Whether the property is on mains gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GasSupply {
    Yes,
    No,
    Unknown,
}

impl GasSupply {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeatingType {
    GasBoiler,
    ElectricStorage,
    ElectricPanels,
    Oil,
    Lpg,
    SolidFuel,
    #[serde(rename = "none")]
    NoCentralHeating,
    Other,
}

impl HeatingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GasBoiler => "gas-boiler",
            Self::ElectricStorage => "electric-storage",
            Self::ElectricPanels => "electric-panels",
            Self::Oil => "oil",
            Self::Lpg => "lpg",
            Self::SolidFuel => "solid-fuel",
            Self::NoCentralHeating => "none",
            Self::Other => "other",
        }
    }

    /// Electric or absent heating, the systems the scheme prioritises off the gas grid.
    pub fn is_electric_or_none(self) -> bool {
        matches!(
            self,
            Self::ElectricStorage | Self::ElectricPanels | Self::NoCentralHeating
        )
    }
}

/// Age bracket of the current boiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoilerAge {
    #[serde(rename = "<5")]
    UnderFive,
    #[serde(rename = "5-8")]
    FiveToEight,
    #[serde(rename = "9-12")]
    NineToTwelve,
    #[serde(rename = "13+")]
    ThirteenPlus,
}

impl BoilerAge {
    pub const OLDEST: BoilerAge = BoilerAge::ThirteenPlus;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnderFive => "<5",
            Self::FiveToEight => "5-8",
            Self::NineToTwelve => "9-12",
            Self::ThirteenPlus => "13+",
        }
    }
}

/// Energy performance certificate band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EpcRating {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl EpcRating {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
        }
    }

    /// E, F and G: the three lowest bands.
    pub fn is_low(self) -> bool {
        matches!(self, Self::E | Self::F | Self::G)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    House,
    Flat,
    Bungalow,
    ParkHome,
    Other,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Flat => "flat",
            Self::Bungalow => "bungalow",
            Self::ParkHome => "park-home",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactMethod {
    Phone,
    Email,
    Whatsapp,
}

impl ContactMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContactTime {
    Morning,
    Afternoon,
    Evening,
    Anytime,
}

impl ContactTime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Anytime => "anytime",
        }
    }
}

/// Benefits offered as checkboxes on the first step.
pub const BENEFIT_OPTIONS: [&str; 9] = [
    "Universal Credit",
    "Pension Credit (Guarantee Credit)",
    "Income-based JSA",
    "Income-related ESA",
    "Income Support",
    "Working Tax Credit",
    "Child Tax Credit",
    "Housing Benefit",
    "Child Benefit (income thresholds apply)",
];

/// Canonical record of everything the visitor has entered.
///
/// Empty strings and `None` mean "not answered". Household counts are kept as
/// the raw numeric strings the visitor typed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerSet {
    // household
    pub property_relationship: Option<PropertyRelationship>,
    pub benefits: BTreeSet<String>,
    pub adults: String,
    pub children: String,

    // property
    pub postcode: String,
    pub address: String,
    pub has_gas: Option<GasSupply>,
    pub current_heating: Option<HeatingType>,
    pub boiler_age: Option<BoilerAge>,
    pub epc_rating: EpcRating,
    pub property_type: Option<PropertyType>,

    // contact
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub preferred_contact: Option<ContactMethod>,
    pub contact_time: Option<ContactTime>,
    pub consent_contact: bool,
    pub consent_privacy: bool,
    pub marketing_opt_in: bool,
    pub notes: String,
}

impl AnswerSet {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Merge a partial edit, returning the fields it touched.
    pub fn apply(&mut self, patch: AnswerPatch) -> Vec<Field> {
        let mut touched = Vec::new();

        macro_rules! merge {
            ($($name:ident => $field:ident),* $(,)?) => {
                $(
                    if let Some(value) = patch.$name {
                        self.$name = value;
                        touched.push(Field::$field);
                    }
                )*
            };
        }

        merge!(
            property_relationship => PropertyRelationship,
            benefits => Benefits,
            adults => Adults,
            children => Children,
            postcode => Postcode,
            address => Address,
            has_gas => HasGas,
            current_heating => CurrentHeating,
            boiler_age => BoilerAge,
            epc_rating => EpcRating,
            property_type => PropertyType,
            first_name => FirstName,
            last_name => LastName,
            email => Email,
            phone => Phone,
            preferred_contact => PreferredContact,
            contact_time => ContactTime,
            consent_contact => ConsentContact,
            consent_privacy => ConsentPrivacy,
            marketing_opt_in => MarketingOptIn,
            notes => Notes,
        );

        touched
    }
}

/// A partial change to an [`AnswerSet`]. Absent keys are left untouched; for
/// optional selections an explicit `null` clears the current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AnswerPatch {
    #[serde(deserialize_with = "present")]
    pub property_relationship: Option<Option<PropertyRelationship>>,
    pub benefits: Option<BTreeSet<String>>,
    pub adults: Option<String>,
    pub children: Option<String>,
    pub postcode: Option<String>,
    pub address: Option<String>,
    #[serde(deserialize_with = "present")]
    pub has_gas: Option<Option<GasSupply>>,
    #[serde(deserialize_with = "present")]
    pub current_heating: Option<Option<HeatingType>>,
    #[serde(deserialize_with = "present")]
    pub boiler_age: Option<Option<BoilerAge>>,
    pub epc_rating: Option<EpcRating>,
    #[serde(deserialize_with = "present")]
    pub property_type: Option<Option<PropertyType>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(deserialize_with = "present")]
    pub preferred_contact: Option<Option<ContactMethod>>,
    #[serde(deserialize_with = "present")]
    pub contact_time: Option<Option<ContactTime>>,
    pub consent_contact: Option<bool>,
    pub consent_privacy: Option<bool>,
    pub marketing_opt_in: Option<bool>,
    pub notes: Option<String>,
}

// Distinguishes `"field": null` (clear) from a missing key (leave alone).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Every field of the answer set, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    PropertyRelationship,
    Benefits,
    Adults,
    Children,
    Postcode,
    Address,
    HasGas,
    CurrentHeating,
    BoilerAge,
    EpcRating,
    PropertyType,
    FirstName,
    LastName,
    Email,
    Phone,
    PreferredContact,
    ContactTime,
    ConsentContact,
    ConsentPrivacy,
    MarketingOptIn,
    Notes,
}

impl Field {
    pub fn step(self) -> Step {
        match self {
            Field::PropertyRelationship | Field::Benefits | Field::Adults | Field::Children => {
                Step::HOUSEHOLD
            }
            Field::Postcode
            | Field::Address
            | Field::HasGas
            | Field::CurrentHeating
            | Field::BoilerAge
            | Field::EpcRating
            | Field::PropertyType => Step::PROPERTY,
            _ => Step::CONTACT,
        }
    }
}

/// Position in the four-step wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Step(u8);

impl Step {
    pub const HOUSEHOLD: Step = Step(1);
    pub const PROPERTY: Step = Step(2);
    pub const CONTACT: Step = Step(3);
    pub const REVIEW: Step = Step(4);

    pub const FIRST: Step = Step::HOUSEHOLD;
    pub const LAST: Step = Step::REVIEW;

    pub const ALL: [Step; 4] = [Step::HOUSEHOLD, Step::PROPERTY, Step::CONTACT, Step::REVIEW];

    pub fn new(number: u8) -> Option<Step> {
        (Self::FIRST.0..=Self::LAST.0)
            .contains(&number)
            .then_some(Step(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Saturates at the review step.
    pub fn next(self) -> Step {
        Step(self.0.saturating_add(1).min(Self::LAST.0))
    }

    /// Saturates at the first step.
    pub fn previous(self) -> Step {
        Step(self.0.saturating_sub(1).max(Self::FIRST.0))
    }

    pub fn title(self) -> &'static str {
        match self.0 {
            1 => "About you",
            2 => "Property",
            3 => "Contact",
            _ => "Review",
        }
    }

    pub fn progress_percent(self) -> u8 {
        let percent = u16::from(self.0) * 100 / u16::from(Self::LAST.0);
        percent as u8
    }

    pub fn fields(self) -> &'static [Field] {
        match self.0 {
            1 => &[
                Field::PropertyRelationship,
                Field::Benefits,
                Field::Adults,
                Field::Children,
            ],
            2 => &[
                Field::Postcode,
                Field::Address,
                Field::HasGas,
                Field::CurrentHeating,
                Field::BoilerAge,
                Field::EpcRating,
                Field::PropertyType,
            ],
            3 => &[
                Field::FirstName,
                Field::LastName,
                Field::Email,
                Field::Phone,
                Field::PreferredContact,
                Field::ContactTime,
                Field::ConsentContact,
                Field::ConsentPrivacy,
                Field::MarketingOptIn,
                Field::Notes,
            ],
            _ => &[],
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Step::FIRST
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Step::new(value).ok_or_else(|| format!("step {value} is outside 1..=4"))
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> Self {
        step.0
    }
}

/// Sparse field → message map. A field absent from the map is currently valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorMap(BTreeMap<Field, String>);

impl ErrorMap {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn remove(&mut self, field: Field) {
        self.0.remove(&field);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}
