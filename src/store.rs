//! Persistence over sled, records encoded as CBOR
use super::config::Config;
use super::error::{ValidationError, WorkflowError};
use super::model::{Ad, Category, ExchangeProposal, Tag};
use sled::{Batch, Db};
use std::sync::Arc;

// key namespaces inside the single sled keyspace
const AD_PREFIX: &str = "ad/";
const CATEGORY_PREFIX: &str = "cat/";
const TAG_PREFIX: &str = "tag/";
const PROPOSAL_PREFIX: &str = "prop/";

#[derive(Clone)]
pub struct Store {
    db: Arc<Db>,
}

impl Store {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn open(config: &Config) -> Result<Self, WorkflowError> {
        let mut settings = sled::Config::new().path(&config.db_path);
        if let Some(bytes) = config.cache_capacity {
            settings = settings.cache_capacity(bytes);
        }
        let db = settings.open()?;

        Ok(Self::new(Arc::new(db)))
    }

    fn key(prefix: &str, id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + id.len());
        key.extend_from_slice(prefix.as_bytes());
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn get<T>(&self, prefix: &str, id: &str) -> Result<Option<T>, WorkflowError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.db.get(Self::key(prefix, id))? {
            Some(raw) => Ok(Some(minicbor::decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn scan<T>(&self, prefix: &str) -> Result<Vec<T>, WorkflowError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut records = Vec::new();
        for entry in self.db.scan_prefix(prefix) {
            let (_, raw) = entry?;
            records.push(minicbor::decode(&raw)?);
        }

        Ok(records)
    }

    // ADS

    pub fn get_ad(&self, id: &str) -> Result<Option<Ad>, WorkflowError> {
        self.get(AD_PREFIX, id)
    }

    pub fn ads(&self) -> Result<Vec<Ad>, WorkflowError> {
        self.scan(AD_PREFIX)
    }

    /// Insert or overwrite an ad. (owner, title) must stay unique across the
    /// directory; a linear scan keeps that rule honest without a second index.
    pub fn put_ad(&self, ad: &Ad) -> Result<(), WorkflowError> {
        for other in self.ads()? {
            if other.id != ad.id && other.owner == ad.owner && other.title == ad.title {
                return Err(ValidationError::DuplicateTitle(ad.title.clone()).into());
            }
        }
        self.db.insert(Self::key(AD_PREFIX, &ad.id), minicbor::to_vec(ad)?)?;

        Ok(())
    }

    /// Delete an ad together with every proposal referencing it on either
    /// side, as one atomic batch.
    pub fn delete_ad(&self, id: &str) -> Result<(), WorkflowError> {
        let mut batch = Batch::default();
        batch.remove(Self::key(AD_PREFIX, id));
        for proposal in self.proposals()? {
            if proposal.ad_sender == id || proposal.ad_receiver == id {
                batch.remove(Self::key(PROPOSAL_PREFIX, &proposal.id));
            }
        }
        self.db.apply_batch(batch)?;

        Ok(())
    }

    // CATEGORIES

    pub fn get_category(&self, id: &str) -> Result<Option<Category>, WorkflowError> {
        self.get(CATEGORY_PREFIX, id)
    }

    pub fn categories(&self) -> Result<Vec<Category>, WorkflowError> {
        self.scan(CATEGORY_PREFIX)
    }

    pub fn put_category(&self, category: &Category) -> Result<(), WorkflowError> {
        for other in self.categories()? {
            if other.id != category.id && other.title == category.title {
                return Err(ValidationError::DuplicateCategory(category.title.clone()).into());
            }
        }
        self.db.insert(
            Self::key(CATEGORY_PREFIX, &category.id),
            minicbor::to_vec(category)?,
        )?;

        Ok(())
    }

    /// Delete a category. Ads referencing it keep living with the reference
    /// set to null, rewritten in the same batch.
    pub fn delete_category(&self, id: &str) -> Result<(), WorkflowError> {
        let mut batch = Batch::default();
        batch.remove(Self::key(CATEGORY_PREFIX, id));
        for mut ad in self.ads()? {
            if ad.category.as_deref() == Some(id) {
                ad.category = None;
                batch.insert(Self::key(AD_PREFIX, &ad.id), minicbor::to_vec(&ad)?);
            }
        }
        self.db.apply_batch(batch)?;

        Ok(())
    }

    // TAGS

    pub fn get_tag(&self, id: &str) -> Result<Option<Tag>, WorkflowError> {
        self.get(TAG_PREFIX, id)
    }

    pub fn tags(&self) -> Result<Vec<Tag>, WorkflowError> {
        self.scan(TAG_PREFIX)
    }

    pub fn put_tag(&self, tag: &Tag) -> Result<(), WorkflowError> {
        for other in self.tags()? {
            if other.id != tag.id && other.name == tag.name {
                return Err(ValidationError::DuplicateTag(tag.name.clone()).into());
            }
        }
        self.db
            .insert(Self::key(TAG_PREFIX, &tag.id), minicbor::to_vec(tag)?)?;

        Ok(())
    }

    /// Delete a tag and unlink it from every ad carrying it, atomically.
    pub fn delete_tag(&self, id: &str) -> Result<(), WorkflowError> {
        let mut batch = Batch::default();
        batch.remove(Self::key(TAG_PREFIX, id));
        for mut ad in self.ads()? {
            if ad.tags.iter().any(|tag| tag == id) {
                ad.tags.retain(|tag| tag != id);
                batch.insert(Self::key(AD_PREFIX, &ad.id), minicbor::to_vec(&ad)?);
            }
        }
        self.db.apply_batch(batch)?;

        Ok(())
    }

    // PROPOSALS
    //
    // Proposals are only ever removed as a cascade effect of deleting one of
    // their ads, so there is no standalone delete here.

    pub fn get_proposal(&self, id: &str) -> Result<Option<ExchangeProposal>, WorkflowError> {
        self.get(PROPOSAL_PREFIX, id)
    }

    pub fn proposals(&self) -> Result<Vec<ExchangeProposal>, WorkflowError> {
        self.scan(PROPOSAL_PREFIX)
    }

    pub fn put_proposal(&self, proposal: &ExchangeProposal) -> Result<(), WorkflowError> {
        self.db.insert(
            Self::key(PROPOSAL_PREFIX, &proposal.id),
            minicbor::to_vec(proposal)?,
        )?;

        Ok(())
    }
}
