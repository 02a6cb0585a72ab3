//! Contract event handlers.
//!
//! Every handler follows the same create-if-absent pattern: load by a
//! deterministic ID and only create when nothing is there yet, so that a
//! replayed log leaves the store unchanged. Missing parents and duplicates
//! are absorbed and reported as [`HandlerOutcome::Dropped`]; only store
//! failures surface as errors.

use tracing::debug;

use crate::decoder::{AttendeeAction, ContractEvent, EventCreated};
use crate::entities::{attendance_id, Account, Address, Confirmation, Event, EventMetadata, Rsvp};
use crate::events::{DropReason, HandlerOutcome, IndexerMetrics};
use crate::metadata::MetadataEnricher;
use crate::store::{BlockBatch, EntityStore, StoreResult};

/// Collaborators shared by all handlers.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    /// Metadata enricher; `None` disables enrichment.
    pub enricher: Option<&'a MetadataEnricher>,
    /// Metrics sink.
    pub metrics: &'a IndexerMetrics,
}

/// Routes a decoded event to its handler.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub async fn dispatch<S: EntityStore + ?Sized>(
    batch: &mut BlockBatch<'_, S>,
    ctx: HandlerContext<'_>,
    event: &ContractEvent,
) -> StoreResult<HandlerOutcome> {
    let outcome = match event {
        ContractEvent::EventCreated(created) => handle_event_created(batch, ctx, created).await?,
        ContractEvent::RsvpSubmitted(action) => handle_rsvp(batch, action).await?,
        ContractEvent::AttendeeConfirmed(action) => handle_confirmed_attendee(batch, action).await?,
        ContractEvent::DepositsPaidOut { event_id } => {
            handle_deposits_paid_out(batch, &event_id.to_hex()).await?
        }
    };

    if let HandlerOutcome::Dropped(reason) = outcome {
        debug!(
            event = event.name(),
            event_id = %event.event_id(),
            reason = reason.as_str(),
            "event dropped"
        );
    }
    Ok(outcome)
}

/// Creates an event unless its ID already exists.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub async fn handle_event_created<S: EntityStore + ?Sized>(
    batch: &mut BlockBatch<'_, S>,
    ctx: HandlerContext<'_>,
    created: &EventCreated,
) -> StoreResult<HandlerOutcome> {
    let id = created.event_id.to_hex();
    if batch.load::<Event>(&id).await?.is_some() {
        return Ok(HandlerOutcome::Dropped(DropReason::DuplicateEvent));
    }

    let metadata = match ctx.enricher {
        Some(enricher) => {
            let enrichment = enricher.enrich(&created.event_data_cid).await;
            if enrichment.degraded {
                ctx.metrics.record_metadata_failure();
            }
            enrichment.metadata
        }
        None => EventMetadata::default(),
    };

    batch.upsert(Event {
        id: id.clone(),
        event_id: id,
        event_owner: created.creator.to_hex(),
        event_timestamp: created.event_timestamp,
        max_capacity: created.max_capacity,
        deposit: created.deposit,
        event_data_cid: created.event_data_cid.clone(),
        paid_out: false,
        total_rsvps: 0,
        total_confirmed_attendees: 0,
        metadata,
    });
    Ok(HandlerOutcome::Applied)
}

/// Loads an account, creating and staging a zeroed one if absent.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub async fn get_or_create_account<S: EntityStore + ?Sized>(
    batch: &mut BlockBatch<'_, S>,
    address: &Address,
) -> StoreResult<Account> {
    if let Some(account) = batch.load::<Account>(&address.to_hex()).await? {
        return Ok(account);
    }
    let account = Account::new(address);
    batch.upsert(account.clone());
    Ok(account)
}

/// Records an RSVP once per (event, attendee) pair.
///
/// The attendee account is created even if the RSVP is dropped.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub async fn handle_rsvp<S: EntityStore + ?Sized>(
    batch: &mut BlockBatch<'_, S>,
    action: &AttendeeAction,
) -> StoreResult<HandlerOutcome> {
    let id = attendance_id(&action.event_id, &action.attendee);
    let existing = batch.load::<Rsvp>(&id).await?;
    let mut account = get_or_create_account(batch, &action.attendee).await?;
    let Some(mut event) = batch.load::<Event>(&action.event_id.to_hex()).await? else {
        return Ok(HandlerOutcome::Dropped(DropReason::UnknownEvent));
    };
    if existing.is_some() {
        return Ok(HandlerOutcome::Dropped(DropReason::DuplicateRsvp));
    }

    batch.upsert(Rsvp {
        id,
        attendee: account.id.clone(),
        event: event.id.clone(),
    });
    event.total_rsvps = event.total_rsvps.saturating_add(1);
    batch.upsert(event);
    account.total_rsvps = account.total_rsvps.saturating_add(1);
    batch.upsert(account);
    Ok(HandlerOutcome::Applied)
}

/// Records a confirmed attendance once per (event, attendee) pair.
///
/// Does not require a prior RSVP. The attendee account is created even if
/// the confirmation is dropped.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub async fn handle_confirmed_attendee<S: EntityStore + ?Sized>(
    batch: &mut BlockBatch<'_, S>,
    action: &AttendeeAction,
) -> StoreResult<HandlerOutcome> {
    let id = attendance_id(&action.event_id, &action.attendee);
    let existing = batch.load::<Confirmation>(&id).await?;
    let mut account = get_or_create_account(batch, &action.attendee).await?;
    let Some(mut event) = batch.load::<Event>(&action.event_id.to_hex()).await? else {
        return Ok(HandlerOutcome::Dropped(DropReason::UnknownEvent));
    };
    if existing.is_some() {
        return Ok(HandlerOutcome::Dropped(DropReason::DuplicateConfirmation));
    }

    batch.upsert(Confirmation {
        id,
        attendee: account.id.clone(),
        event: event.id.clone(),
    });
    event.total_confirmed_attendees = event.total_confirmed_attendees.saturating_add(1);
    batch.upsert(event);
    account.total_attended_events = account.total_attended_events.saturating_add(1);
    batch.upsert(account);
    Ok(HandlerOutcome::Applied)
}

/// Marks an event's deposits as paid out.
///
/// # Errors
///
/// Returns an error only if the store fails.
pub async fn handle_deposits_paid_out<S: EntityStore + ?Sized>(
    batch: &mut BlockBatch<'_, S>,
    event_id: &str,
) -> StoreResult<HandlerOutcome> {
    let Some(mut event) = batch.load::<Event>(event_id).await? else {
        return Ok(HandlerOutcome::Dropped(DropReason::UnknownEvent));
    };
    event.paid_out = true;
    batch.upsert(event);
    Ok(HandlerOutcome::Applied)
}
