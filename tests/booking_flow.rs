//! End-to-end reservation and settlement flows through the library API.
//!
//! Exercises the full path a client walks: register an asset, check
//! availability, book, pay through the (stubbed) gateway, reconcile, and
//! let the lifecycle run its course.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use wheelhouse::ledger::Ledger;
use wheelhouse::reservations::ReservationService;
use wheelhouse::settlement::{
    AttemptGuard, GatewayStatus, GuardConfig, InitiateSettlementRequest, Reconciler,
    SettlementGateway, SettlementState, StubGateway,
};
use wheelhouse::sweep;
use wheelhouse::types::{
    ActorContext, BookingStatus, CoreError, PaymentStatus, Role, SettlementEntity,
};

struct World {
    ledger: Arc<Ledger>,
    stub: Arc<StubGateway>,
    reservations: ReservationService,
    reconciler: Reconciler,
}

fn world_with_guard(config: GuardConfig) -> World {
    let ledger = Arc::new(Ledger::new());
    let stub = Arc::new(StubGateway::new());
    let guard = Arc::new(AttemptGuard::new(config));
    let reservations = ReservationService::new(Arc::clone(&ledger));
    let reconciler = Reconciler::new(
        Arc::clone(&ledger),
        Arc::clone(&stub) as Arc<dyn SettlementGateway>,
        guard,
    );
    World {
        ledger,
        stub,
        reservations,
        reconciler,
    }
}

fn world() -> World {
    world_with_guard(GuardConfig {
        rate_limit: 100,
        ..GuardConfig::default()
    })
}

fn owner() -> ActorContext {
    ActorContext::new(Uuid::new_v4(), Role::Owner, true)
}

fn renter() -> ActorContext {
    ActorContext::new(Uuid::new_v4(), Role::Renter, true)
}

fn days(d: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(d)
}

#[tokio::test]
async fn full_rental_flow_reserve_pay_complete() {
    let w = world();

    // Owner lists a vehicle
    let o = owner();
    let asset = w.reservations.register_asset(&o, 3000).unwrap();

    // Renter sees the window free and books it
    let r = renter();
    assert!(w
        .reservations
        .is_available(asset.id, days(1), days(3), Utc::now())
        .unwrap());
    let booking = w
        .reservations
        .create_booking(&r, asset.id, days(1), days(3))
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    // Renter pays for the booking and reconciles on return
    let initiated = w
        .reconciler
        .initiate(
            &r,
            InitiateSettlementRequest {
                entity: SettlementEntity::Booking(booking.id),
                amount_minor: 6000,
            },
        )
        .await
        .unwrap();

    let outcome = w.reconciler.reconcile(&r, &initiated.pidx).await.unwrap();
    assert_eq!(outcome.state, SettlementState::Settled);
    assert_eq!(
        w.ledger.booking(booking.id).unwrap().status,
        BookingStatus::Confirmed
    );

    // The paid window now blocks overlapping requests
    assert!(!w
        .reservations
        .is_available(asset.id, days(2), days(4), Utc::now())
        .unwrap());
}

#[tokio::test]
async fn boundary_touching_windows_do_not_conflict() {
    let w = world();
    let asset = w.reservations.register_asset(&owner(), 3000).unwrap();

    let first = w
        .reservations
        .create_booking(&renter(), asset.id, days(1), days(5))
        .unwrap();
    let o = owner_of(&w, asset.id);
    w.reservations
        .update_booking_status(&o, first.id, BookingStatus::Confirmed)
        .unwrap();

    // Overlap is rejected both by the advisory read and at commit
    assert!(!w
        .reservations
        .is_available(asset.id, days(3), days(7), Utc::now())
        .unwrap());
    assert!(matches!(
        w.reservations
            .create_booking(&renter(), asset.id, days(3), days(7)),
        Err(CoreError::Conflict(_))
    ));

    // A back-to-back window starting exactly at the previous end succeeds
    assert!(w
        .reservations
        .create_booking(&renter(), asset.id, days(5), days(7))
        .is_ok());
}

#[tokio::test]
async fn cancelled_booking_is_immutable() {
    let w = world();
    let o = owner();
    let asset = w.reservations.register_asset(&o, 3000).unwrap();
    let r = renter();
    let booking = w
        .reservations
        .create_booking(&r, asset.id, days(1), days(3))
        .unwrap();

    w.reservations
        .update_booking_status(&r, booking.id, BookingStatus::Cancelled)
        .unwrap();

    let res = w
        .reservations
        .update_booking_status(&o, booking.id, BookingStatus::Confirmed);
    assert!(matches!(res, Err(CoreError::Immutable(_))));
}

#[tokio::test]
async fn asset_settlement_is_idempotent_across_retries() {
    let w = world();
    let o = owner();
    let asset = w.reservations.register_asset(&o, 3000).unwrap();

    let initiated = w
        .reconciler
        .initiate(
            &o,
            InitiateSettlementRequest {
                entity: SettlementEntity::Asset(asset.id),
                amount_minor: 3000,
            },
        )
        .await
        .unwrap();

    // Client retries the verification call five times
    for _ in 0..5 {
        let outcome = w.reconciler.reconcile(&o, &initiated.pidx).await.unwrap();
        assert_eq!(outcome.state, SettlementState::Settled);
    }

    // One gateway query, one PAID mutation
    assert_eq!(w.stub.lookup_count(), 1);
    assert_eq!(
        w.ledger.asset(asset.id).unwrap().payment_status,
        PaymentStatus::Paid
    );
}

#[tokio::test]
async fn double_click_initiation_is_deduplicated() {
    let w = world();
    let o = owner();
    let asset = w.reservations.register_asset(&o, 3000).unwrap();
    let request = InitiateSettlementRequest {
        entity: SettlementEntity::Asset(asset.id),
        amount_minor: 3000,
    };

    w.reconciler.initiate(&o, request.clone()).await.unwrap();
    let res = w.reconciler.initiate(&o, request).await;
    assert!(matches!(res, Err(CoreError::DuplicateInFlight(_))));
}

#[tokio::test]
async fn rate_limit_kicks_in_on_excess_attempts() {
    let w = world_with_guard(GuardConfig {
        rate_limit: 3,
        ..GuardConfig::default()
    });

    let o = owner();
    let mut last = None;
    for _ in 0..4 {
        let asset = w.reservations.register_asset(&o, 3000).unwrap();
        last = Some(
            w.reconciler
                .initiate(
                    &o,
                    InitiateSettlementRequest {
                        entity: SettlementEntity::Asset(asset.id),
                        amount_minor: 3000,
                    },
                )
                .await,
        );
    }

    assert!(matches!(last, Some(Err(CoreError::RateLimited(_)))));
}

#[tokio::test]
async fn declined_payment_leaves_booking_pending() {
    let w = world();
    let asset = w.reservations.register_asset(&owner(), 3000).unwrap();
    let r = renter();
    let booking = w
        .reservations
        .create_booking(&r, asset.id, days(1), days(3))
        .unwrap();

    let initiated = w
        .reconciler
        .initiate(
            &r,
            InitiateSettlementRequest {
                entity: SettlementEntity::Booking(booking.id),
                amount_minor: 6000,
            },
        )
        .await
        .unwrap();

    w.stub.set_status(&initiated.pidx, GatewayStatus::UserCanceled);

    let outcome = w.reconciler.reconcile(&r, &initiated.pidx).await.unwrap();
    assert_eq!(
        outcome.state,
        SettlementState::Declined {
            gateway_status: "User canceled".into()
        }
    );
    assert_eq!(
        w.ledger.booking(booking.id).unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn completion_sweep_closes_finished_rentals() {
    let w = world();
    let o = owner();
    let asset = w.reservations.register_asset(&o, 3000).unwrap();

    // Seed a historical confirmed booking directly in the ledger
    let then = Utc::now() - Duration::days(10);
    let booking = w
        .ledger
        .bookings
        .create(
            wheelhouse::types::Booking::new(
                asset.id,
                Uuid::new_v4(),
                then + Duration::days(1),
                then + Duration::days(3),
            ),
            then,
        )
        .unwrap();
    w.ledger
        .bookings
        .update_status(
            booking.id,
            BookingStatus::Confirmed,
            wheelhouse::lifecycle::TransitionActor::AssetOwner,
            BookingStatus::Pending,
            then,
        )
        .unwrap();

    assert_eq!(sweep::complete_overdue(&w.ledger), 1);
    assert_eq!(
        w.ledger.booking(booking.id).unwrap().status,
        BookingStatus::Completed
    );

    // Completed bookings are terminal for everyone
    let res = w
        .reservations
        .update_booking_status(&o, booking.id, BookingStatus::Cancelled);
    assert!(matches!(res, Err(CoreError::Immutable(_))));
}

/// Actor context for the owner of the given asset.
fn owner_of(w: &World, asset_id: Uuid) -> ActorContext {
    let asset = w.ledger.asset(asset_id).unwrap();
    ActorContext::new(asset.owner_id, Role::Owner, true)
}
