//! Boundary request/response types and the identity-checking facade
//!
//! A presentation layer (HTML or JSON, out of scope here) resolves the
//! caller through its identity provider and hands this module an optional
//! user id. Everything else arrives as explicit per-operation structs; there
//! is no reflective field wiring at this seam.
use super::error::WorkflowError;
use super::model::{ExchangeProposal, ProposalStatus};
use super::service::{ProposalFilter, ProposalService};
use super::store::Store;

/// Body of POST /proposals. A caller-supplied `status` is ignored outright;
/// new proposals always start out pending.
#[derive(Debug, Default, Clone)]
pub struct ProposalCreateRequest {
    pub ad_sender: String,
    pub ad_receiver: String,
    pub comment: Option<String>,
    pub status: Option<String>,
}

/// Body of PATCH /proposals/{id}. The immutable fields are accepted and
/// ignored when present, not errored.
#[derive(Debug, Default, Clone)]
pub struct ProposalStatusRequest {
    pub status: String,
    pub ad_sender: Option<String>,
    pub ad_receiver: Option<String>,
    pub comment: Option<String>,
}

/// Query string of the two GET /proposals views.
#[derive(Debug, Default, Clone)]
pub struct ProposalQuery {
    pub status: Option<String>,
    pub counterparty: Option<String>,
}

/// Wire representation of a proposal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProposalView {
    pub id: String,
    pub ad_sender: String,
    pub ad_receiver: String,
    pub comment: Option<String>,
    pub status: String,
    pub created_at: String, // RFC 3339
}

impl From<ExchangeProposal> for ProposalView {
    fn from(proposal: ExchangeProposal) -> Self {
        Self {
            id: proposal.id,
            ad_sender: proposal.ad_sender,
            ad_receiver: proposal.ad_receiver,
            comment: proposal.comment,
            status: proposal.status.as_str().to_string(),
            created_at: proposal.created_at.to_datetime_utc().to_rfc3339(),
        }
    }
}

pub struct ProposalApi {
    service: ProposalService,
}

impl ProposalApi {
    pub fn new(store: Store) -> Self {
        Self {
            service: ProposalService::new(store),
        }
    }

    fn require_identity(identity: Option<&str>) -> Result<&str, WorkflowError> {
        identity.ok_or(WorkflowError::Unauthenticated)
    }

    pub fn create(
        &self,
        identity: Option<&str>,
        request: &ProposalCreateRequest,
    ) -> Result<ProposalView, WorkflowError> {
        let actor = Self::require_identity(identity)?;
        // request.status is deliberately never consulted
        let proposal = self.service.create(
            actor,
            &request.ad_sender,
            &request.ad_receiver,
            request.comment.as_deref(),
        )?;

        Ok(proposal.into())
    }

    pub fn update_status(
        &self,
        identity: Option<&str>,
        proposal_id: &str,
        request: &ProposalStatusRequest,
    ) -> Result<ProposalView, WorkflowError> {
        let actor = Self::require_identity(identity)?;
        let proposal = self
            .service
            .update_status(actor, proposal_id, &request.status)?;

        Ok(proposal.into())
    }

    pub fn to_me(
        &self,
        identity: Option<&str>,
        query: &ProposalQuery,
    ) -> Result<Vec<ProposalView>, WorkflowError> {
        let actor = Self::require_identity(identity)?;
        let filter = Self::filter_from(query)?;
        let proposals = self.service.to_me(actor, &filter)?;

        Ok(proposals.into_iter().map(Into::into).collect())
    }

    pub fn from_me(
        &self,
        identity: Option<&str>,
        query: &ProposalQuery,
    ) -> Result<Vec<ProposalView>, WorkflowError> {
        let actor = Self::require_identity(identity)?;
        let filter = Self::filter_from(query)?;
        let proposals = self.service.from_me(actor, &filter)?;

        Ok(proposals.into_iter().map(Into::into).collect())
    }

    fn filter_from(query: &ProposalQuery) -> Result<ProposalFilter, WorkflowError> {
        let status = match &query.status {
            Some(raw) => Some(raw.parse::<ProposalStatus>()?),
            None => None,
        };

        Ok(ProposalFilter {
            status,
            counterparty: query.counterparty.clone(),
        })
    }
}
