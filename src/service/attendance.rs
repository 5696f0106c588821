//! Daily attendance state machine.
//!
//! Per user and calendar day: `NoSession -> Open -> Closed`. A day holds at
//! most one attendance row, so a second check-in is rejected even after the
//! first session closed. Rejections never write.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::model::attendance::{
    Attendance, CheckOutUpdate, Coordinates, NewCheckIn, SessionPhase,
};
use crate::service::clock::Clock;
use crate::store::AttendanceStore;

#[derive(Debug, Clone)]
pub struct CheckInRequest {
    pub status_id: u64,
    pub photo: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CheckOutRequest {
    /// Replaces the status chosen at check-in when present.
    pub status_id: Option<u64>,
    pub photo: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NoSession,
    Open(Attendance),
    Closed(Attendance),
}

impl SessionState {
    fn from_row(row: Option<Attendance>) -> Self {
        match row {
            None => SessionState::NoSession,
            Some(a) if a.is_open() => SessionState::Open(a),
            Some(a) => SessionState::Closed(a),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::NoSession => SessionPhase::NoSession,
            SessionState::Open(_) => SessionPhase::Open,
            SessionState::Closed(_) => SessionPhase::Closed,
        }
    }

    pub fn attendance(&self) -> Option<&Attendance> {
        match self {
            SessionState::NoSession => None,
            SessionState::Open(a) | SessionState::Closed(a) => Some(a),
        }
    }

    pub fn into_attendance(self) -> Option<Attendance> {
        match self {
            SessionState::NoSession => None,
            SessionState::Open(a) | SessionState::Closed(a) => Some(a),
        }
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn AttendanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    #[instrument(name = "attendance_check_in", skip(self, req), fields(status_id = req.status_id))]
    pub async fn check_in(&self, user_id: u64, req: CheckInRequest) -> AppResult<Attendance> {
        let location =
            Coordinates::new(req.latitude, req.longitude).map_err(AppError::InvalidInput)?;
        let photo = required_photo(req.photo, "clock_in_photo")?;

        if !self.store.user_exists(user_id).await? {
            return Err(AppError::not_found("User not found"));
        }
        self.require_status(req.status_id).await?;

        let now = self.clock.now();
        let today = now.date();

        if let Some(existing) = self.store.find_for_day(user_id, today).await? {
            return Err(match existing.phase() {
                SessionPhase::Closed => AppError::conflict("Attendance for today is already complete"),
                _ => AppError::conflict("Already checked in today"),
            });
        }

        // A concurrent check-in can still win between the read above and this
        // insert; the store rejects the loser with Conflict.
        let row = self
            .store
            .insert_check_in(&NewCheckIn {
                user_id,
                status_id: req.status_id,
                work_date: today,
                clock_in: now,
                photo,
                location,
                description: normalize(req.description),
            })
            .await?;

        info!(attendance_id = row.id, "Checked in");
        Ok(row)
    }

    #[instrument(name = "attendance_check_out", skip(self, req))]
    pub async fn check_out(&self, user_id: u64, req: CheckOutRequest) -> AppResult<Attendance> {
        let location =
            Coordinates::new(req.latitude, req.longitude).map_err(AppError::InvalidInput)?;
        let photo = required_photo(req.photo, "clock_out_photo")?;

        if let Some(status_id) = req.status_id {
            self.require_status(status_id).await?;
        }

        let now = self.clock.now();
        let today = now.date();
        let update = CheckOutUpdate {
            status_id: req.status_id,
            clock_out: now,
            photo,
            location,
            description: normalize(req.description),
        };

        if let Some(row) = self.store.close_open_session(user_id, today, &update).await? {
            info!(attendance_id = row.id, "Checked out");
            return Ok(row);
        }

        // Nothing was open: tell "never checked in" apart from "already out".
        match self.store.find_for_day(user_id, today).await? {
            None => Err(AppError::not_found("No check-in found for today")),
            Some(_) => Err(AppError::conflict("Already checked out today")),
        }
    }

    pub async fn status(&self, user_id: u64, day: NaiveDate) -> AppResult<SessionState> {
        let row = self.store.find_for_day(user_id, day).await?;
        Ok(SessionState::from_row(row))
    }

    pub async fn status_today(&self, user_id: u64) -> AppResult<SessionState> {
        self.status(user_id, self.today()).await
    }

    pub async fn history(
        &self,
        user_id: u64,
        limit: u32,
        offset: u32,
    ) -> AppResult<(Vec<Attendance>, i64)> {
        self.store.list_for_user(user_id, limit, offset).await
    }

    async fn require_status(&self, status_id: u64) -> AppResult<()> {
        match self.store.find_status(status_id).await? {
            Some(status) if status.is_active => Ok(()),
            Some(_) => Err(AppError::not_found(format!("Status {status_id} is inactive"))),
            None => Err(AppError::not_found(format!("Status {status_id} not found"))),
        }
    }
}

fn required_photo(photo: String, field: &str) -> AppResult<String> {
    let photo = photo.trim();
    if photo.is_empty() {
        return Err(AppError::invalid(format!("{field} is required")));
    }
    Ok(photo.to_string())
}

fn normalize(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use actix_web::rt::task::yield_now;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDateTime};

    use super::*;
    use crate::model::status::Status;
    use crate::service::clock::testing::FixedClock;
    use crate::store::memory::MemoryStore;

    const USER: u64 = 7;
    const PRESENT: u64 = 1;
    const WFH: u64 = 2;
    const RETIRED_STATUS: u64 = 3;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn setup(now: &str) -> (Arc<MemoryStore>, Arc<FixedClock>, AttendanceService) {
        let store = Arc::new(MemoryStore::new());
        store.add_user(USER);
        store.add_user(8);
        store.add_status(PRESENT, "PRESENT", true);
        store.add_status(WFH, "WFH", true);
        store.add_status(RETIRED_STATUS, "OLD", false);
        let clock = Arc::new(FixedClock::at(at(now)));
        let service = AttendanceService::new(store.clone(), clock.clone());
        (store, clock, service)
    }

    fn check_in_req() -> CheckInRequest {
        CheckInRequest {
            status_id: PRESENT,
            photo: "in.jpg".into(),
            latitude: -6.2,
            longitude: 106.8,
            description: Some("office".into()),
        }
    }

    fn check_out_req() -> CheckOutRequest {
        CheckOutRequest {
            status_id: None,
            photo: "out.jpg".into(),
            latitude: -6.21,
            longitude: 106.81,
            description: None,
        }
    }

    #[actix_web::test]
    async fn full_day_walks_through_every_state() {
        let (store, clock, service) = setup("2026-10-18 08:00:00");

        assert_eq!(service.status_today(USER).await.unwrap(), SessionState::NoSession);

        let opened = service.check_in(USER, check_in_req()).await.unwrap();
        assert!(opened.is_clocked_in);
        assert!(!opened.is_clocked_out);
        assert_eq!(opened.clock_out, None);
        assert_eq!(opened.work_date, at("2026-10-18 00:00:00").date());
        assert_eq!(service.status_today(USER).await.unwrap().phase(), SessionPhase::Open);

        let again = service.check_in(USER, check_in_req()).await.unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));

        clock.advance(Duration::hours(9));
        let closed = service.check_out(USER, check_out_req()).await.unwrap();
        assert!(closed.is_clocked_out);
        assert_eq!(closed.clock_out, Some(at("2026-10-18 17:00:00")));
        assert_eq!(closed.clock_out_photo.as_deref(), Some("out.jpg"));
        assert_eq!(closed.description.as_deref(), Some("office"));

        let state = service.status_today(USER).await.unwrap();
        assert_eq!(state.phase(), SessionPhase::Closed);
        assert_eq!(state.attendance().map(|a| a.id), Some(closed.id));

        let second_out = service.check_out(USER, check_out_req()).await.unwrap_err();
        assert!(matches!(second_out, AppError::Conflict(_)));

        let after_close = service.check_in(USER, check_in_req()).await.unwrap_err();
        assert!(matches!(after_close, AppError::Conflict(_)));

        assert_eq!(store.attendance_rows().len(), 1);
    }

    #[actix_web::test]
    async fn rejected_check_in_leaves_the_row_untouched() {
        let (store, clock, service) = setup("2026-10-18 08:00:00");
        service.check_in(USER, check_in_req()).await.unwrap();
        let before = store.attendance_rows();

        clock.advance(Duration::minutes(5));
        let mut other = check_in_req();
        other.status_id = WFH;
        other.photo = "second.jpg".into();
        assert!(service.check_in(USER, other).await.is_err());

        assert_eq!(store.attendance_rows(), before);
    }

    #[actix_web::test]
    async fn check_out_without_check_in_is_not_found_and_writes_nothing() {
        let (store, _clock, service) = setup("2026-10-18 17:00:00");

        let err = service.check_out(USER, check_out_req()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.attendance_rows().is_empty());
    }

    #[actix_web::test]
    async fn yesterdays_open_session_does_not_count_today() {
        let (_store, clock, service) = setup("2026-10-17 08:00:00");
        service.check_in(USER, check_in_req()).await.unwrap();

        clock.set(at("2026-10-18 09:00:00"));
        let err = service.check_out(USER, check_out_req()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let today = service.check_in(USER, check_in_req()).await.unwrap();
        assert_eq!(today.work_date, at("2026-10-18 00:00:00").date());
        let yesterday = service
            .status(USER, at("2026-10-17 00:00:00").date())
            .await
            .unwrap();
        assert_eq!(yesterday.phase(), SessionPhase::Open);
    }

    #[actix_web::test]
    async fn clock_out_never_precedes_clock_in() {
        let (_store, clock, service) = setup("2026-10-18 08:00:00");
        let opened = service.check_in(USER, check_in_req()).await.unwrap();

        clock.set(at("2026-10-18 07:59:00"));
        let closed = service.check_out(USER, check_out_req()).await.unwrap();

        assert!(closed.clock_out.unwrap() >= opened.clock_in);
    }

    #[actix_web::test]
    async fn check_out_merges_status_and_description() {
        let (_store, clock, service) = setup("2026-10-18 08:00:00");
        service.check_in(USER, check_in_req()).await.unwrap();

        clock.advance(Duration::hours(4));
        let mut req = check_out_req();
        req.status_id = Some(WFH);
        req.description = Some("  left early  ".into());
        let closed = service.check_out(USER, req).await.unwrap();

        assert_eq!(closed.status_id, WFH);
        assert_eq!(closed.description.as_deref(), Some("left early"));
        assert_eq!(closed.latitude_clock_out, Some(-6.21));
    }

    #[actix_web::test]
    async fn unknown_or_inactive_status_is_not_found() {
        let (store, _clock, service) = setup("2026-10-18 08:00:00");

        let mut req = check_in_req();
        req.status_id = 404;
        assert!(matches!(
            service.check_in(USER, req).await,
            Err(AppError::NotFound(_))
        ));

        let mut req = check_in_req();
        req.status_id = RETIRED_STATUS;
        assert!(matches!(
            service.check_in(USER, req).await,
            Err(AppError::NotFound(_))
        ));

        service.check_in(USER, check_in_req()).await.unwrap();
        let mut out = check_out_req();
        out.status_id = Some(404);
        assert!(matches!(
            service.check_out(USER, out).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(service.status_today(USER).await.unwrap().phase(), SessionPhase::Open);
        assert_eq!(store.attendance_rows().len(), 1);
    }

    #[actix_web::test]
    async fn unknown_user_cannot_check_in() {
        let (store, _clock, service) = setup("2026-10-18 08:00:00");

        let err = service.check_in(999, check_in_req()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.attendance_rows().is_empty());
    }

    #[actix_web::test]
    async fn bad_input_is_rejected_before_any_lookup() {
        let (store, _clock, service) = setup("2026-10-18 08:00:00");

        let mut req = check_in_req();
        req.latitude = 91.0;
        assert!(matches!(
            service.check_in(USER, req).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut req = check_in_req();
        req.photo = "   ".into();
        assert!(matches!(
            service.check_in(USER, req).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut out = check_out_req();
        out.longitude = -200.0;
        assert!(matches!(
            service.check_out(USER, out).await,
            Err(AppError::InvalidInput(_))
        ));

        assert!(store.attendance_rows().is_empty());
    }

    /// Lets every caller finish its read before anyone inserts.
    struct YieldAfterRead {
        inner: Arc<MemoryStore>,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl AttendanceStore for YieldAfterRead {
        async fn user_exists(&self, user_id: u64) -> AppResult<bool> {
            self.inner.user_exists(user_id).await
        }

        async fn find_status(&self, status_id: u64) -> AppResult<Option<Status>> {
            self.inner.find_status(status_id).await
        }

        async fn find_for_day(&self, user_id: u64, day: NaiveDate) -> AppResult<Option<Attendance>> {
            let row = self.inner.find_for_day(user_id, day).await;
            yield_now().await;
            row
        }

        async fn insert_check_in(&self, new: &NewCheckIn) -> AppResult<Attendance> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert_check_in(new).await
        }

        async fn close_open_session(
            &self,
            user_id: u64,
            day: NaiveDate,
            update: &CheckOutUpdate,
        ) -> AppResult<Option<Attendance>> {
            self.inner.close_open_session(user_id, day, update).await
        }

        async fn list_for_user(
            &self,
            user_id: u64,
            limit: u32,
            offset: u32,
        ) -> AppResult<(Vec<Attendance>, i64)> {
            self.inner.list_for_user(user_id, limit, offset).await
        }
    }

    #[actix_web::test]
    async fn concurrent_check_ins_open_a_single_session() {
        let (store, clock, _service) = setup("2026-10-18 08:00:00");
        let racing = Arc::new(YieldAfterRead {
            inner: store.clone(),
            inserts: AtomicUsize::new(0),
        });
        let service = AttendanceService::new(racing.clone(), clock);

        let attempts = (0..16).map(|_| service.check_in(USER, check_in_req()));
        let results = futures::future::join_all(attempts).await;

        // every attempt got past the read, so the insert decided the winner
        assert_eq!(racing.inserts.load(Ordering::SeqCst), 16);

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AppError::Conflict(_))));

        let rows = store.attendance_rows();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_open());
    }

    #[actix_web::test]
    async fn users_do_not_interfere() {
        let (_store, _clock, service) = setup("2026-10-18 08:00:00");

        service.check_in(USER, check_in_req()).await.unwrap();
        service.check_in(8, check_in_req()).await.unwrap();
        service.check_out(8, check_out_req()).await.unwrap();

        assert_eq!(service.status_today(USER).await.unwrap().phase(), SessionPhase::Open);
        assert_eq!(service.status_today(8).await.unwrap().phase(), SessionPhase::Closed);
    }

    #[actix_web::test]
    async fn history_is_newest_first() {
        let (_store, clock, service) = setup("2026-10-16 08:00:00");
        for _ in 0..3 {
            service.check_in(USER, check_in_req()).await.unwrap();
            clock.advance(Duration::days(1));
        }

        let (rows, total) = service.history(USER, 2, 0).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].work_date > rows[1].work_date);

        let (rest, _) = service.history(USER, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].work_date, at("2026-10-16 00:00:00").date());
    }

    #[actix_web::test]
    async fn store_failure_surfaces_as_store_unavailable() {
        let (store, _clock, service) = setup("2026-10-18 08:00:00");
        store.set_unavailable(true);

        assert!(matches!(
            service.check_in(USER, check_in_req()).await,
            Err(AppError::StoreUnavailable(_))
        ));
    }
}
