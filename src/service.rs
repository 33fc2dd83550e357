//! Service layer API for directory and proposal workflow operations
use super::error::{ValidationError, WorkflowError};
use super::model::{
    Ad, AdDraft, Category, Condition, ExchangeProposal, ProposalStatus, Tag, TimeStamp,
};
use super::store::Store;
use super::utils;
use log::info;
use std::str::FromStr;

/// Optional narrowing for the two proposal read views.
#[derive(Debug, Default, Clone)]
pub struct ProposalFilter {
    pub status: Option<ProposalStatus>,
    /// User id of the party on the other side of the proposal.
    pub counterparty: Option<String>,
}

/// Optional narrowing for directory listings.
#[derive(Debug, Default, Clone)]
pub struct AdFilter {
    /// Case-insensitive substring match over title and description.
    pub query: Option<String>,
    pub category: Option<String>,
    pub condition: Option<Condition>,
}

// which side of a proposal the requesting user must own
enum Side {
    Sender,
    Receiver,
}

/// The ad directory: listing CRUD, search, and category/tag management.
/// Every mutation is gated on the owning user.
pub struct AdDirectory {
    store: Store,
}

impl AdDirectory {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn ad(&self, ad_id: &str) -> Result<Ad, WorkflowError> {
        self.store
            .get_ad(ad_id)?
            .ok_or_else(|| WorkflowError::not_found("ad", ad_id))
    }

    // a draft may only point at categories and tags that actually exist;
    // the set-null and unlink cascades keep the rule holding afterwards
    fn check_references(&self, ad: &Ad) -> Result<(), WorkflowError> {
        if let Some(category_id) = &ad.category {
            if self.store.get_category(category_id)?.is_none() {
                return Err(WorkflowError::not_found("category", category_id));
            }
        }
        for tag_id in &ad.tags {
            if self.store.get_tag(tag_id)?.is_none() {
                return Err(WorkflowError::not_found("tag", tag_id));
            }
        }

        Ok(())
    }

    /// Publish a new listing. The owner is always the authenticated actor,
    /// never a field of the draft.
    pub fn create_ad(&self, actor: &str, draft: AdDraft) -> Result<Ad, WorkflowError> {
        let id = utils::new_ad_id()?;
        let ad = draft.build(id, actor.to_string())?;
        self.check_references(&ad)?;
        self.store.put_ad(&ad)?;
        info!("ad created: '{}' by {}", ad.title, ad.owner);

        Ok(ad)
    }

    /// Replace a listing's content fields. Identity, ownership and creation
    /// time survive the edit; `updated_at` is bumped.
    pub fn update_ad(&self, actor: &str, ad_id: &str, draft: AdDraft) -> Result<Ad, WorkflowError> {
        let current = self.ad(ad_id)?;
        if current.owner != actor {
            return Err(WorkflowError::Forbidden("only the owner may edit an ad"));
        }

        let mut next = draft.build(current.id, current.owner)?;
        next.created_at = current.created_at;
        self.check_references(&next)?;
        self.store.put_ad(&next)?;
        info!("ad updated: '{}'", next.title);

        Ok(next)
    }

    /// Remove a listing. Proposals referencing it on either side go with it.
    pub fn delete_ad(&self, actor: &str, ad_id: &str) -> Result<(), WorkflowError> {
        let current = self.ad(ad_id)?;
        if current.owner != actor {
            return Err(WorkflowError::Forbidden("only the owner may delete an ad"));
        }

        self.store.delete_ad(ad_id)?;
        info!("ad deleted: '{}' by {}", current.title, current.owner);

        Ok(())
    }

    /// Listings matching the filter, newest first.
    pub fn list_ads(&self, filter: &AdFilter) -> Result<Vec<Ad>, WorkflowError> {
        let mut ads = self.store.ads()?;

        if let Some(query) = &filter.query {
            let needle = query.to_lowercase();
            ads.retain(|ad| {
                ad.title.to_lowercase().contains(&needle)
                    || ad.description.to_lowercase().contains(&needle)
            });
        }
        if let Some(category) = &filter.category {
            ads.retain(|ad| ad.category.as_deref() == Some(category.as_str()));
        }
        if let Some(condition) = filter.condition {
            ads.retain(|ad| ad.condition == condition);
        }

        ads.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(ads)
    }

    /// Listings owned by one user, newest first.
    pub fn ads_of(&self, owner: &str) -> Result<Vec<Ad>, WorkflowError> {
        let mut ads = self.store.ads()?;
        ads.retain(|ad| ad.owner == owner);
        ads.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(ads)
    }

    pub fn create_category(&self, title: &str) -> Result<Category, WorkflowError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }

        let category = Category {
            id: utils::new_category_id()?,
            title: title.to_string(),
        };
        self.store.put_category(&category)?;

        Ok(category)
    }

    /// Drop a category; dependent ads keep living with the reference nulled.
    pub fn delete_category(&self, category_id: &str) -> Result<(), WorkflowError> {
        if self.store.get_category(category_id)?.is_none() {
            return Err(WorkflowError::not_found("category", category_id));
        }
        self.store.delete_category(category_id)
    }

    pub fn categories(&self) -> Result<Vec<Category>, WorkflowError> {
        self.store.categories()
    }

    pub fn create_tag(&self, name: &str) -> Result<Tag, WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let tag = Tag {
            id: utils::new_tag_id()?,
            name: name.to_string(),
        };
        self.store.put_tag(&tag)?;

        Ok(tag)
    }

    pub fn delete_tag(&self, tag_id: &str) -> Result<(), WorkflowError> {
        if self.store.get_tag(tag_id)?.is_none() {
            return Err(WorkflowError::not_found("tag", tag_id));
        }
        self.store.delete_tag(tag_id)
    }

    pub fn tags(&self) -> Result<Vec<Tag>, WorkflowError> {
        self.store.tags()
    }
}

/// The exchange negotiation workflow. Creation rights belong to the
/// sender-ad owner, status rights to the receiver-ad owner; nobody owns a
/// proposal outright.
pub struct ProposalService {
    store: Store,
}

impl ProposalService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn resolve_ad(&self, ad_id: &str) -> Result<Ad, WorkflowError> {
        self.store
            .get_ad(ad_id)?
            .ok_or_else(|| WorkflowError::not_found("ad", ad_id))
    }

    /// Offer an exchange from one of the actor's ads to somebody else's ad.
    /// New proposals always start out pending.
    pub fn create(
        &self,
        actor: &str,
        sender_ad_id: &str,
        receiver_ad_id: &str,
        comment: Option<&str>,
    ) -> Result<ExchangeProposal, WorkflowError> {
        let sender = self.resolve_ad(sender_ad_id)?;
        if sender.owner != actor {
            return Err(WorkflowError::Forbidden(
                "proposals can only be sent from your own ads",
            ));
        }

        let receiver = self.resolve_ad(receiver_ad_id)?;
        if sender.id == receiver.id {
            return Err(ValidationError::SameAd.into());
        }
        if receiver.owner == actor {
            return Err(ValidationError::OwnReceiverAd.into());
        }

        let proposal = ExchangeProposal {
            id: utils::new_proposal_id()?,
            ad_sender: sender.id,
            ad_receiver: receiver.id,
            comment: comment.map(|comment| comment.trim().to_string()),
            status: ProposalStatus::Pending,
            created_at: TimeStamp::new(),
        };
        self.store.put_proposal(&proposal)?;
        info!(
            "proposal {} created: {} -> {}",
            proposal.id, proposal.ad_sender, proposal.ad_receiver
        );

        Ok(proposal)
    }

    /// Accept or reject a proposal addressed to one of the actor's ads.
    /// Sender, receiver, comment and creation time are immutable; only the
    /// status field is overwritten.
    pub fn update_status(
        &self,
        actor: &str,
        proposal_id: &str,
        status: &str,
    ) -> Result<ExchangeProposal, WorkflowError> {
        let mut proposal = self
            .store
            .get_proposal(proposal_id)?
            .ok_or_else(|| WorkflowError::not_found("proposal", proposal_id))?;

        let receiver = self.resolve_ad(&proposal.ad_receiver)?;
        if receiver.owner != actor {
            return Err(WorkflowError::Forbidden(
                "only the receiving ad's owner may change the status",
            ));
        }

        let status = match ProposalStatus::from_str(status)? {
            ProposalStatus::Pending => {
                return Err(ValidationError::StatusNotAllowed(status.to_string()).into());
            }
            decided => decided,
        };

        // no terminal-state guard: a decided proposal may be decided again
        proposal.status = status;
        self.store.put_proposal(&proposal)?;
        info!("proposal {} {} by {}", proposal.id, status, actor);

        Ok(proposal)
    }

    /// Proposals aimed at ads the actor owns, newest first.
    pub fn to_me(
        &self,
        actor: &str,
        filter: &ProposalFilter,
    ) -> Result<Vec<ExchangeProposal>, WorkflowError> {
        self.view(actor, filter, Side::Receiver)
    }

    /// Proposals sent from ads the actor owns, newest first.
    pub fn from_me(
        &self,
        actor: &str,
        filter: &ProposalFilter,
    ) -> Result<Vec<ExchangeProposal>, WorkflowError> {
        self.view(actor, filter, Side::Sender)
    }

    fn view(
        &self,
        actor: &str,
        filter: &ProposalFilter,
        side: Side,
    ) -> Result<Vec<ExchangeProposal>, WorkflowError> {
        let mut matches = Vec::new();
        for proposal in self.store.proposals()? {
            // cascade deletes keep both references live, but a record caught
            // mid-batch is silently skipped rather than surfaced
            let (Some(sender), Some(receiver)) = (
                self.store.get_ad(&proposal.ad_sender)?,
                self.store.get_ad(&proposal.ad_receiver)?,
            ) else {
                continue;
            };

            let (mine, theirs) = match side {
                Side::Receiver => (&receiver, &sender),
                Side::Sender => (&sender, &receiver),
            };
            if mine.owner != actor {
                continue;
            }
            if let Some(status) = filter.status {
                if proposal.status != status {
                    continue;
                }
            }
            if let Some(counterparty) = &filter.counterparty {
                if &theirs.owner != counterparty {
                    continue;
                }
            }
            matches.push(proposal);
        }

        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(matches)
    }
}
