//! Core marketplace records and the ad draft builder
use super::error::ValidationError;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Condition {
    #[n(0)]
    New,
    #[n(1)]
    Used,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Condition::New),
            "used" => Ok(Condition::Used),
            other => Err(ValidationError::UnknownCondition(other.to_string())),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProposalStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "accepted" => Ok(ProposalStatus::Accepted),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// hand-written rather than derived: a derive would demand Ord on the
// timezone marker itself, which chrono's Utc does not implement
impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .expect("new_with was handed an invalid calendar date or time")
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

// nanosecond precision so per-process timestamps order the same way the
// records were written
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// A named classification; ads reference it weakly.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct Category {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub title: String,
}

/// A named label, many-to-many with ads.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct Tag {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct Ad {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub owner: String, // user id, the only party allowed to mutate
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub image: Option<String>, // reference only, upload handling lives elsewhere
    #[n(5)]
    pub category: Option<String>, // category id, nulled when the category goes away
    #[n(6)]
    pub condition: Condition,
    #[n(7)]
    pub tags: Vec<String>, // tag ids, order-irrelevant
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub updated_at: TimeStamp<Utc>,
}

impl Ad {
    pub fn is_new(&self) -> bool {
        self.condition == Condition::New
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Eq, PartialEq)]
pub struct ExchangeProposal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub ad_sender: String, // ad id the offer is made from
    #[n(2)]
    pub ad_receiver: String, // ad id the offer is aimed at
    #[n(3)]
    pub comment: Option<String>,
    #[n(4)]
    pub status: ProposalStatus,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
}

// Used for constructing ad drafts before they are owned and stored
#[derive(Debug, Default, Clone)]
pub struct AdDraft {
    // No id or owner here, both are assigned by the directory
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
    category: Option<String>,
    condition: Option<Condition>,
    tags: Vec<String>,
}

impl AdDraft {
    /// Construct a new builder object, this becomes the basis for a draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.trim().to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }
    pub fn set_category(mut self, category_id: &str) -> Self {
        self.category = Some(category_id.to_string());
        self
    }
    pub fn set_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
    pub fn add_tag(mut self, tag_id: &str) -> Self {
        self.tags.push(tag_id.to_string());
        self
    }

    // Checks fields, then finalises the draft into a stored record shape.
    // Ownership and identity always come from the caller, never the draft.
    pub fn build(self, id: String, owner: String) -> Result<Ad, ValidationError> {
        let title = match self.title {
            Some(title) if !title.trim().is_empty() => title,
            _ => return Err(ValidationError::EmptyTitle),
        };
        let condition = match self.condition {
            Some(condition) => condition,
            None => return Err(ValidationError::MissingCondition),
        };

        let now = TimeStamp::new();
        Ok(Ad {
            id,
            owner,
            title,
            description: self.description.unwrap_or_default(),
            image: self.image,
            category: self.category,
            condition,
            tags: self.tags,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2024, 6, 15, 10, 30, 0);
        let later = TimeStamp::new_with(2024, 6, 15, 10, 30, 1);

        assert!(earlier < later);
        assert_eq!(earlier.cmp(&later), std::cmp::Ordering::Less);

        // sorting leans on the full Ord impl, like the newest-first views do
        let mut stamps = vec![later.clone(), earlier.clone()];
        stamps.sort();
        assert_eq!(stamps, vec![earlier, later]);
    }

    #[test]
    fn ad_encoding() {
        let original = AdDraft::new()
            .set_title("Bicycle, barely ridden")
            .set_description("Three-speed city bike")
            .set_condition(Condition::Used)
            .build("ad_1".into(), "user_1".into())
            .unwrap();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: Ad = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!("pending".parse::<ProposalStatus>().unwrap(), ProposalStatus::Pending);
        assert_eq!("accepted".parse::<ProposalStatus>().unwrap(), ProposalStatus::Accepted);
        assert_eq!("rejected".parse::<ProposalStatus>().unwrap(), ProposalStatus::Rejected);
        assert!("approved".parse::<ProposalStatus>().is_err());
    }

    #[test]
    fn draft_rejects_blank_title() {
        let draft = AdDraft::new().set_title("   ").set_condition(Condition::New);

        assert_eq!(
            draft.build("ad_1".into(), "user_1".into()).unwrap_err(),
            ValidationError::EmptyTitle
        );
    }
}
