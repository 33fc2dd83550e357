//! Id minting for marketplace records

use bech32::Bech32m;
use uuid7::uuid7;

// human-readable prefixes so a bare id says what kind of record it names
pub const USER_HRP: &str = "user_";
pub const AD_HRP: &str = "ad_";
pub const CATEGORY_HRP: &str = "cat_";
pub const TAG_HRP: &str = "tag_";
pub const PROPOSAL_HRP: &str = "prop_";

// construct a unique uuid7 then encode using bech32 with an entity prefix.
// uuid7 is time-ordered, so ids minted later in a process sort later.
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_user_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(USER_HRP)
}

pub fn new_ad_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(AD_HRP)
}

pub fn new_category_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(CATEGORY_HRP)
}

pub fn new_tag_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(TAG_HRP)
}

pub fn new_proposal_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(PROPOSAL_HRP)
}
