//! End-to-end negotiation scenarios across the directory and the workflow

use anyhow::Context;
use exchange_board::{
    api::{ProposalApi, ProposalCreateRequest, ProposalQuery, ProposalStatusRequest},
    error::WorkflowError,
    model::{AdDraft, Condition, ProposalStatus},
    service::{AdDirectory, ProposalFilter, ProposalService},
    store::Store,
    utils,
};
use sled::open;
use std::sync::Arc;
use tempfile::tempdir;

// Sled uses file-based locking to prevent concurrent access, so every test
// opens its own database on temp for simplified cleanup.
fn open_store(dir: &tempfile::TempDir, name: &str) -> anyhow::Result<Store> {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = open(dir.path().join(name))?;
    db.clear()?;
    Ok(Store::new(Arc::new(db)))
}

fn bike_draft(title: &str) -> AdDraft {
    AdDraft::new()
        .set_title(title)
        .set_description("Three-speed city bike, recently serviced")
        .set_condition(Condition::Used)
}

#[test]
fn propose_accept_and_lock_out_the_sender() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir, "propose_accept.db")?;
    let directory = AdDirectory::new(store.clone());
    let service = ProposalService::new(store.clone());

    let user_a = utils::new_user_id()?;
    let user_b = utils::new_user_id()?;
    let user_c = utils::new_user_id()?;

    let ad_s = directory.create_ad(&user_a, bike_draft("Mountain bike"))?;
    let ad_r = directory.create_ad(&user_b, bike_draft("Record player"))?;

    let proposal = service
        .create(&user_a, &ad_s.id, &ad_r.id, Some("swap?"))
        .context("proposal failed on create: ")?;

    assert_eq!(proposal.status, ProposalStatus::Pending);
    assert_eq!(proposal.comment.as_deref(), Some("swap?"));

    // the receiver-ad owner decides
    let proposal = service
        .update_status(&user_b, &proposal.id, "accepted")
        .context("proposal failed on accept: ")?;

    assert_eq!(proposal.status, ProposalStatus::Accepted);

    // the original sender may not revise the decision
    let err = service
        .update_status(&user_a, &proposal.id, "rejected")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // neither may an unrelated third party
    let err = service
        .update_status(&user_c, &proposal.id, "rejected")
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // the stored status survived both attempts
    let stored = store.get_proposal(&proposal.id)?.unwrap();
    assert_eq!(stored.status, ProposalStatus::Accepted);

    Ok(())
}

#[test]
fn spoofed_sender_ad_creates_nothing() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir, "spoofed_sender.db")?;
    let directory = AdDirectory::new(store.clone());
    let service = ProposalService::new(store.clone());

    let user_a = utils::new_user_id()?;
    let user_b = utils::new_user_id()?;

    let ad_a = directory.create_ad(&user_a, bike_draft("Camera lens"))?;
    let ad_b = directory.create_ad(&user_b, bike_draft("Guitar amp"))?;

    // A tries to send from B's ad
    let err = service
        .create(&user_a, &ad_b.id, &ad_a.id, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // A tries to target A's own ad
    let ad_a2 = directory.create_ad(&user_a, bike_draft("Camera body"))?;
    let err = service
        .create(&user_a, &ad_a.id, &ad_a2.id, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // A proposes an ad to itself
    let err = service
        .create(&user_a, &ad_a.id, &ad_a.id, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));

    // a sender ad id nothing ever minted is a missing record, not a
    // permission problem
    let err = service
        .create(&user_a, "ad_does_not_exist", &ad_b.id, None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));

    // same for the receiver side, even with a perfectly owned sender
    let err = service
        .create(&user_a, &ad_a.id, "ad_does_not_exist", None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));

    // none of the rejected attempts left a row behind
    assert!(store.proposals()?.is_empty());

    Ok(())
}

#[test]
fn read_views_split_by_side_and_filter() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir, "read_views.db")?;
    let directory = AdDirectory::new(store.clone());
    let service = ProposalService::new(store);

    let user_a = utils::new_user_id()?;
    let user_b = utils::new_user_id()?;

    let ad_s = directory.create_ad(&user_a, bike_draft("Espresso machine"))?;
    let ad_r = directory.create_ad(&user_b, bike_draft("Stand mixer"))?;

    let proposal = service.create(&user_a, &ad_s.id, &ad_r.id, Some("swap?"))?;

    // unfiltered "to me" for B sees the one proposal from A
    let to_b = service.to_me(&user_b, &ProposalFilter::default())?;
    assert_eq!(to_b.len(), 1);
    assert_eq!(to_b[0].id, proposal.id);

    // the sender sees nothing addressed to them
    assert!(service.to_me(&user_a, &ProposalFilter::default())?.is_empty());

    let accepted = service.update_status(&user_b, &proposal.id, "accepted")?;
    assert_eq!(accepted.status, ProposalStatus::Accepted);

    // "from me" for A narrowed to accepted finds it
    let filter = ProposalFilter {
        status: Some(ProposalStatus::Accepted),
        counterparty: None,
    };
    let from_a = service.from_me(&user_a, &filter)?;
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].id, proposal.id);

    // narrowed to pending it is gone
    let filter = ProposalFilter {
        status: Some(ProposalStatus::Pending),
        counterparty: None,
    };
    assert!(service.from_me(&user_a, &filter)?.is_empty());

    // counterparty narrowing matches the user on the other side
    let filter = ProposalFilter {
        status: None,
        counterparty: Some(user_a.clone()),
    };
    assert_eq!(service.to_me(&user_b, &filter)?.len(), 1);

    let filter = ProposalFilter {
        status: None,
        counterparty: Some(user_b.clone()),
    };
    assert!(service.to_me(&user_b, &filter)?.is_empty());

    Ok(())
}

#[test]
fn views_order_newest_first() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir, "ordering.db")?;
    let directory = AdDirectory::new(store.clone());
    let service = ProposalService::new(store);

    let user_a = utils::new_user_id()?;
    let user_b = utils::new_user_id()?;

    let ad_r = directory.create_ad(&user_b, bike_draft("Workbench"))?;

    let mut created = Vec::new();
    for n in 0..5 {
        let ad = directory.create_ad(&user_a, bike_draft(&format!("Toolbox {n}")))?;
        created.push(service.create(&user_a, &ad.id, &ad_r.id, None)?);
    }

    let seen: Vec<String> = service
        .to_me(&user_b, &ProposalFilter::default())?
        .into_iter()
        .map(|p| p.id)
        .collect();
    let expected: Vec<String> = created.into_iter().rev().map(|p| p.id).collect();

    assert_eq!(seen, expected);

    Ok(())
}

#[test]
fn deleting_an_ad_cascades_to_its_proposals() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir, "cascade.db")?;
    let directory = AdDirectory::new(store.clone());
    let service = ProposalService::new(store.clone());

    let user_a = utils::new_user_id()?;
    let user_b = utils::new_user_id()?;
    let user_c = utils::new_user_id()?;

    let ad_a = directory.create_ad(&user_a, bike_draft("Typewriter"))?;
    let ad_b = directory.create_ad(&user_b, bike_draft("Bread maker"))?;
    let ad_c = directory.create_ad(&user_c, bike_draft("Vinyl crate"))?;

    // two proposals touch B's ad, one does not
    let touching_1 = service.create(&user_a, &ad_a.id, &ad_b.id, None)?;
    let touching_2 = service.create(&user_b, &ad_b.id, &ad_c.id, None)?;
    let unrelated = service.create(&user_a, &ad_a.id, &ad_c.id, None)?;

    // only the owner may delete
    let err = directory.delete_ad(&user_a, &ad_b.id).unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    directory.delete_ad(&user_b, &ad_b.id)?;

    assert!(store.get_ad(&ad_b.id)?.is_none());
    assert!(store.get_proposal(&touching_1.id)?.is_none());
    assert!(store.get_proposal(&touching_2.id)?.is_none());
    assert!(store.get_proposal(&unrelated.id)?.is_some());

    Ok(())
}

#[test]
fn api_boundary_honours_the_contract() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = open_store(&temp_dir, "api_boundary.db")?;
    let directory = AdDirectory::new(store.clone());
    let api = ProposalApi::new(store);

    let user_a = utils::new_user_id()?;
    let user_b = utils::new_user_id()?;

    let ad_s = directory.create_ad(&user_a, bike_draft("Film camera"))?;
    let ad_r = directory.create_ad(&user_b, bike_draft("Turntable"))?;

    // no identity, no access
    let request = ProposalCreateRequest {
        ad_sender: ad_s.id.clone(),
        ad_receiver: ad_r.id.clone(),
        comment: Some("  trade for the turntable?  ".into()),
        status: None,
    };
    let err = api.create(None, &request).unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated));
    assert_eq!(err.http_status(), 403);

    // the read views are just as closed to anonymous callers
    let err = api.to_me(None, &ProposalQuery::default()).unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated));
    let err = api.from_me(None, &ProposalQuery::default()).unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated));

    // a caller-supplied status is ignored, the comment is trimmed
    let request = ProposalCreateRequest {
        status: Some("accepted".into()),
        ..request
    };
    let view = api.create(Some(&user_a), &request)?;
    assert_eq!(view.status, "pending");
    assert_eq!(view.comment.as_deref(), Some("trade for the turntable?"));

    // immutable fields in the patch body are ignored, not errored
    let patch = ProposalStatusRequest {
        status: "accepted".into(),
        ad_sender: Some(ad_r.id.clone()),
        ad_receiver: Some(ad_s.id.clone()),
        comment: Some("rewritten".into()),
    };
    let view = api.update_status(Some(&user_b), &view.id, &patch)?;
    assert_eq!(view.status, "accepted");
    assert_eq!(view.ad_sender, ad_s.id);
    assert_eq!(view.ad_receiver, ad_r.id);
    assert_eq!(view.comment.as_deref(), Some("trade for the turntable?"));

    // a made-up status in the patch body is a validation failure
    let patch = ProposalStatusRequest {
        status: "approved".into(),
        ..ProposalStatusRequest::default()
    };
    let err = api.update_status(Some(&user_b), &view.id, &patch).unwrap_err();
    assert_eq!(err.http_status(), 400);

    // an unknown proposal id is a 404
    let patch = ProposalStatusRequest {
        status: "accepted".into(),
        ..ProposalStatusRequest::default()
    };
    let err = api
        .update_status(Some(&user_b), "prop_missing", &patch)
        .unwrap_err();
    assert_eq!(err.http_status(), 404);

    // the query views speak the same string-typed language
    let query = ProposalQuery {
        status: Some("accepted".into()),
        counterparty: None,
    };
    assert_eq!(api.to_me(Some(&user_b), &query)?.len(), 1);
    assert_eq!(api.from_me(Some(&user_a), &query)?.len(), 1);

    let query = ProposalQuery {
        status: Some("pending".into()),
        counterparty: None,
    };
    assert!(api.from_me(Some(&user_a), &query)?.is_empty());

    Ok(())
}
