use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Booking, BookingRequest, Driver, Trip};
use crate::error::{not_found_error, Error};

/// What an expiry sweep changed for one booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub booking_expired: bool,
    pub expired_requests: usize,
}

/// Totals of one sweep over all bookings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub bookings_expired: usize,
    pub requests_expired: usize,
    /// Bookings left for the next sweep because they could not be processed.
    #[serde(default)]
    pub bookings_failed: usize,
}

impl SweepReport {
    pub fn add(&mut self, outcome: SweepOutcome) {
        if outcome.booking_expired {
            self.bookings_expired += 1;
        }
        self.requests_expired += outcome.expired_requests;
    }
}

fn expire_sent<'a, I>(requests: I) -> usize
where
    I: IntoIterator<Item = &'a mut BookingRequest>,
{
    requests.into_iter().map(|r| r.expire()).filter(|changed| *changed).count()
}

/// Settles a driver's acceptance of `request_id`. The caller must hold the
/// booking exclusively while this runs; `requests` are all requests of that
/// booking.
///
/// Returns `None` without touching anything when the offer is no longer
/// available: the request was already answered or is past its window, the
/// booking stopped looking for a driver, or the driver took another trip.
pub fn accept(
    booking: &mut Booking,
    requests: &mut [BookingRequest],
    request_id: Uuid,
    driver: &mut Driver,
    now: DateTime<Utc>,
) -> Result<Option<Trip>, Error> {
    let index = requests
        .iter()
        .position(|r| r.id == request_id && r.booking_id == booking.id)
        .ok_or_else(not_found_error)?;

    if requests[index].driver_id != driver.id {
        return Ok(None);
    }

    if !requests[index].is_open(now)
        || !booking.is_open()
        || booking.is_expired(now)
        || driver.is_on_trip()
    {
        tracing::info!(%request_id, "request is no longer available");
        return Ok(None);
    }

    let trip = booking.convert_to_trip(driver.id, now)?;
    driver.assign(trip.id)?;
    requests[index].accept(now);

    let expired = expire_sent(requests.iter_mut().filter(|r| r.id != request_id));

    tracing::info!(
        booking_id = %booking.id,
        trip_id = %trip.id,
        "request accepted, {} competing requests expired",
        expired
    );

    Ok(Some(trip))
}

/// Expires what has outlived its window: the booking itself with all of its
/// outstanding requests, or only the requests that went stale.
pub fn sweep(booking: &mut Booking, requests: &mut [BookingRequest], now: DateTime<Utc>) -> SweepOutcome {
    if booking.expire(now) {
        return SweepOutcome {
            booking_expired: true,
            expired_requests: expire_sent(requests.iter_mut()),
        };
    }

    SweepOutcome {
        booking_expired: false,
        expired_requests: expire_sent(requests.iter_mut().filter(|r| r.is_stale(now))),
    }
}

/// Runs `sweep_one` for every booking in turn. A booking that fails is
/// logged and counted, and the sweep moves on to the next one.
pub async fn sweep_each<I, F, Fut>(booking_ids: I, mut sweep_one: F) -> SweepReport
where
    I: IntoIterator<Item = Uuid>,
    F: FnMut(Uuid) -> Fut,
    Fut: Future<Output = Result<SweepOutcome, Error>>,
{
    let mut report = SweepReport::default();

    for booking_id in booking_ids {
        match sweep_one(booking_id).await {
            Ok(outcome) => report.add(outcome),
            Err(err) => {
                tracing::warn!(%booking_id, "failed to sweep booking: {}", err);
                report.bookings_failed += 1;
            }
        }
    }

    report
}

/// Cancels a booking on behalf of its passenger, withdrawing every offer
/// still out. Returns the number of withdrawn requests.
pub fn cancel(booking: &mut Booking, requests: &mut [BookingRequest]) -> Result<usize, Error> {
    booking.cancel()?;

    Ok(expire_sent(requests.iter_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        BookingStatus, Category, Coordinates, License, NewBooking, Place, RequestStatus, TripStatus, Vehicle,
        VehicleType,
    };
    use crate::payment::PaymentMethod;
    use crate::routing::RouteEstimate;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn taxi() -> VehicleType {
        VehicleType::new(Category::Taxi, dec!(1000), dec!(250), dec!(50), 4).unwrap()
    }

    fn booking(taxi: &VehicleType, now: DateTime<Utc>) -> Booking {
        let params = NewBooking {
            vehicle_type_id: taxi.id,
            pickup: Place::new("Akwa", Coordinates::new(4.05, 9.77)),
            dropoff: Place::new("Bonapriso", Coordinates::new(4.06, 9.75)),
            is_shared: false,
            payment_method: PaymentMethod::Cash,
            notes: String::new(),
        };
        let route = RouteEstimate {
            distance_km: 2.48,
            duration_min: 6,
        };

        Booking::new(Uuid::new_v4(), params, taxi, route, now).unwrap()
    }

    fn driver(taxi: &VehicleType, now: DateTime<Utc>) -> Driver {
        let mut driver = Driver::new(
            Uuid::new_v4(),
            License {
                number: "CM-9".into(),
                expires_on: (now + Duration::days(30)).date_naive(),
            },
            taxi.id,
            Vehicle {
                plate: "LT 9".into(),
                model: "Corolla".into(),
                color: "yellow".into(),
                year: Some(2012),
            },
            now,
        )
        .unwrap();

        driver.verify();
        driver.set_availability(true).unwrap();
        driver
    }

    fn dispatched(n: usize, now: DateTime<Utc>) -> (Booking, Vec<BookingRequest>, Vec<Driver>) {
        let taxi = taxi();
        let mut booking = booking(&taxi, now);
        let drivers: Vec<Driver> = (0..n).map(|_| driver(&taxi, now)).collect();
        let requests = booking
            .dispatch(drivers.iter().map(|d| d.id), now)
            .unwrap();

        (booking, requests, drivers)
    }

    #[test]
    fn first_acceptance_wins_and_expires_siblings() {
        let now = Utc::now();
        let (mut booking, mut requests, mut drivers) = dispatched(3, now);

        let winner = requests[1].id;
        let trip = accept(&mut booking, &mut requests, winner, &mut drivers[1], now)
            .unwrap()
            .unwrap();

        assert_eq!(trip.status, TripStatus::Accepted);
        assert_eq!(trip.driver_id, drivers[1].id);
        assert_eq!(booking.status, BookingStatus::Accepted);
        assert_eq!(drivers[1].active_trip_id, Some(trip.id));
        assert!(!drivers[1].is_available);

        assert_eq!(requests[1].status, RequestStatus::Accepted);
        assert_eq!(requests[0].status, RequestStatus::Expired);
        assert_eq!(requests[2].status, RequestStatus::Expired);

        // the loser sees an offer that is gone, and nothing changes
        let loser = requests[0].id;
        let before = (booking.clone(), requests.clone(), drivers[0].clone());
        assert!(accept(&mut booking, &mut requests, loser, &mut drivers[0], now)
            .unwrap()
            .is_none());
        assert_eq!((booking, requests, drivers[0].clone()), before);
    }

    #[test]
    fn stale_request_is_not_available() {
        let now = Utc::now();
        let (mut booking, mut requests, mut drivers) = dispatched(1, now);
        let id = requests[0].id;

        let later = now + Duration::minutes(3);
        assert!(accept(&mut booking, &mut requests, id, &mut drivers[0], later)
            .unwrap()
            .is_none());
        assert_eq!(booking.status, BookingStatus::Searching);
    }

    #[test]
    fn driver_on_another_trip_cannot_accept() {
        let now = Utc::now();
        let (mut booking, mut requests, mut drivers) = dispatched(1, now);
        drivers[0].assign(Uuid::new_v4()).unwrap();

        let id = requests[0].id;
        assert!(accept(&mut booking, &mut requests, id, &mut drivers[0], now)
            .unwrap()
            .is_none());
        assert!(requests[0].is_sent());
    }

    #[test]
    fn unknown_request_is_not_found() {
        let now = Utc::now();
        let (mut booking, mut requests, mut drivers) = dispatched(1, now);

        let err = accept(&mut booking, &mut requests, Uuid::new_v4(), &mut drivers[0], now).unwrap_err();
        assert!(err.is_not_found_error());
    }

    #[test]
    fn sweep_expires_stale_requests_then_booking() {
        let now = Utc::now();
        let (mut booking, mut requests, _) = dispatched(2, now);

        let outcome = sweep(&mut booking, &mut requests, now + Duration::minutes(1));
        assert_eq!(outcome, SweepOutcome::default());

        let outcome = sweep(&mut booking, &mut requests, now + Duration::minutes(3));
        assert_eq!(outcome.expired_requests, 2);
        assert!(!outcome.booking_expired);
        assert_eq!(booking.status, BookingStatus::Searching);

        let outcome = sweep(&mut booking, &mut requests, now + Duration::minutes(11));
        assert!(outcome.booking_expired);
        assert_eq!(booking.status, BookingStatus::Expired);

        // repeated sweeps are no-ops
        let snapshot = (booking.clone(), requests.clone());
        let outcome = sweep(&mut booking, &mut requests, now + Duration::minutes(30));
        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!((booking, requests), snapshot);
    }

    #[test]
    fn sweep_leaves_accepted_booking_alone() {
        let now = Utc::now();
        let (mut booking, mut requests, mut drivers) = dispatched(1, now);
        let id = requests[0].id;
        accept(&mut booking, &mut requests, id, &mut drivers[0], now).unwrap().unwrap();

        let outcome = sweep(&mut booking, &mut requests, now + Duration::hours(1));
        assert_eq!(outcome, SweepOutcome::default());
        assert_eq!(booking.status, BookingStatus::Accepted);
        assert_eq!(requests[0].status, RequestStatus::Accepted);
    }

    #[test]
    fn cancel_withdraws_outstanding_requests() {
        let now = Utc::now();
        let (mut booking, mut requests, _) = dispatched(2, now);
        requests[0].reject(now);

        assert_eq!(cancel(&mut booking, &mut requests).unwrap(), 1);
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(requests[0].status, RequestStatus::Rejected);
        assert_eq!(requests[1].status, RequestStatus::Expired);

        assert!(cancel(&mut booking, &mut requests).is_err());
    }

    struct Shared {
        booking: Booking,
        requests: Vec<BookingRequest>,
        drivers: HashMap<Uuid, Driver>,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acceptances_produce_one_trip() {
        let now = Utc::now();
        let (booking, requests, drivers) = dispatched(8, now);
        let offers: Vec<(Uuid, Uuid)> = requests.iter().map(|r| (r.id, r.driver_id)).collect();

        let shared = Arc::new(Mutex::new(Shared {
            booking,
            requests,
            drivers: drivers.into_iter().map(|d| (d.id, d)).collect(),
        }));

        let handles: Vec<_> = offers
            .into_iter()
            .map(|(request_id, driver_id)| {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let mut guard = shared.lock().await;
                    let Shared {
                        booking,
                        requests,
                        drivers,
                    } = &mut *guard;
                    let driver = drivers.get_mut(&driver_id).unwrap();

                    accept(booking, requests, request_id, driver, now).unwrap()
                })
            })
            .collect();

        let mut trips = Vec::new();
        for handle in handles {
            if let Some(trip) = handle.await.unwrap() {
                trips.push(trip);
            }
        }

        assert_eq!(trips.len(), 1);

        let guard = shared.lock().await;
        let accepted = guard
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Accepted)
            .count();
        let expired = guard
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Expired)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(expired, 7);
        assert_eq!(guard.booking.status, BookingStatus::Accepted);
    }

    #[tokio::test]
    async fn sweep_continues_past_a_failing_booking() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let broken = ids[1];
        let mut visited = Vec::new();

        let report = sweep_each(ids.clone(), |booking_id| {
            visited.push(booking_id);

            async move {
                if booking_id == broken {
                    Err(crate::error::database_error("connection reset"))
                } else {
                    Ok(SweepOutcome {
                        booking_expired: true,
                        expired_requests: 2,
                    })
                }
            }
        })
        .await;

        assert_eq!(visited, ids);
        assert_eq!(
            report,
            SweepReport {
                bookings_expired: 2,
                requests_expired: 4,
                bookings_failed: 1,
            }
        );
    }
}
