//! Shared fixtures for the integration tests: in-memory stores, a scripted
//! CRM double, and helpers to drive the real router with `oneshot`.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tower::ServiceExt;

use leadsync::common::error::AppError;
use leadsync::config::{AppState, BitrixConfig, Config};
use leadsync::db::{CommentStore, LeadStore, ReferralStore, UserStore};
use leadsync::middleware::auth::RequestContext;
use leadsync::models::auth::{Role, User};
use leadsync::models::bitrix::{CommentView, CrmId, LeadView, RewardFieldCodes};
use leadsync::models::comment::{Comment, NewComment};
use leadsync::models::lead::{CreateLeadPayload, Lead, LeadFilter, LeadPatch, NewLead};
use leadsync::models::referral::Referral;
use leadsync::router::build_router;
use leadsync::services::bitrix_service::{CrmClient, CrmError};

pub const FUNNEL_ID: &str = "42";
pub const DEAL_TOKEN: &str = "deal-secret";
pub const COMMENT_TOKEN: &str = "comment-secret";
pub const MANAGER_USER_ID: i64 = 228;
pub const PASSWORD: &str = "secret123";

// ---------------------------------------------------------------------------
// Lead store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemLeads {
    rows: Mutex<BTreeMap<i64, Lead>>,
}

impl MemLeads {
    pub fn insert(&self, lead: Lead) {
        self.rows.lock().unwrap().insert(lead.id, lead);
    }

    pub fn get(&self, id: i64) -> Option<Lead> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

fn matches_filter(lead: &Lead, filter: &LeadFilter) -> bool {
    let search_hit = match filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            [&lead.fio, &lead.address, &lead.phone_number]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        }
        None => true,
    };

    filter.status_id.is_none_or(|s| lead.status_id == s)
        && filter.start_date.is_none_or(|d| lead.created_at >= d)
        && filter.end_date.is_none_or(|d| lead.created_at <= d)
        && filter.created_before.is_none_or(|d| lead.created_at < d)
        && filter.user_id.is_none_or(|u| lead.user_id == u)
        && filter.is_internet.is_none_or(|b| lead.internet == b)
        && filter.is_shipping.is_none_or(|b| lead.shipping == b)
        && filter.is_cleaning.is_none_or(|b| lead.cleaning == b)
        && search_hit
}

#[async_trait]
impl LeadStore for MemLeads {
    async fn by_id(&self, id: i64) -> Result<Lead, AppError> {
        self.get(id).ok_or(AppError::NotFound("lead"))
    }

    async fn create(&self, lead: &NewLead) -> Result<Lead, AppError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&lead.id) {
            return Err(AppError::DatabaseError(sqlx::Error::Protocol("duplicate key".into())));
        }
        let row = Lead {
            id: lead.id,
            user_id: lead.user_id,
            fio: lead.fio.clone(),
            address: lead.address.clone(),
            phone_number: lead.phone_number.clone(),
            status_id: lead.status_id,
            internet: lead.internet,
            cleaning: lead.cleaning,
            shipping: lead.shipping,
            reward_internet: lead.reward_internet,
            reward_cleaning: lead.reward_cleaning,
            reward_shipping: lead.reward_shipping,
            created_at: Utc::now(),
            completed_at: None,
            payment_at: None,
        };
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list(&self, filter: &LeadFilter) -> Result<Vec<Lead>, AppError> {
        let mut leads: Vec<Lead> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|lead| matches_filter(lead, filter))
            .cloned()
            .collect();

        // Same ordering and paging as the SQL: status match first, newest first,
        // OFFSET always applied, LIMIT 0 means no limit.
        leads.sort_by_key(|lead| {
            (
                filter.status_id != Some(lead.status_id),
                std::cmp::Reverse(lead.created_at),
            )
        });
        let limit = if filter.limit > 0 { filter.limit as usize } else { usize::MAX };
        leads = leads
            .into_iter()
            .skip(filter.offset as usize)
            .take(limit)
            .collect();

        if leads.is_empty() {
            return Err(AppError::EmptyResult("leads"));
        }
        Ok(leads)
    }

    async fn update(&self, id: i64, patch: &LeadPatch) -> Result<u64, AppError> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut rows = self.rows.lock().unwrap();
        let Some(lead) = rows.get_mut(&id) else {
            return Ok(0);
        };

        if let Some(v) = patch.status_id {
            lead.status_id = v;
        }
        if let Some(v) = patch.reward_internet {
            lead.reward_internet = v;
        }
        if let Some(v) = patch.reward_cleaning {
            lead.reward_cleaning = v;
        }
        if let Some(v) = patch.reward_shipping {
            lead.reward_shipping = v;
        }
        // Same write-once rule as the COALESCE in the Postgres repository.
        if lead.completed_at.is_none() {
            lead.completed_at = patch.completed_at;
        }
        if lead.payment_at.is_none() {
            lead.payment_at = patch.payment_at;
        }
        Ok(1)
    }
}

// ---------------------------------------------------------------------------
// Comment store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemComments {
    rows: Mutex<BTreeMap<i64, Comment>>,
}

impl MemComments {
    pub fn get(&self, id: i64) -> Option<Comment> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl CommentStore for MemComments {
    async fn save(&self, comment: &NewComment) -> Result<Comment, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let id = comment
            .id
            .unwrap_or_else(|| rows.keys().next_back().copied().unwrap_or(0) + 1);

        let row = rows.entry(id).or_insert_with(|| Comment {
            id,
            lead_id: comment.lead_id,
            user_id: comment.user_id,
            text: comment.text.clone(),
            created_at: Utc::now(),
        });
        Ok(row.clone())
    }

    async fn by_lead(&self, lead_id: i64) -> Result<Vec<Comment>, AppError> {
        let mut comments: Vec<Comment> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.lead_id == lead_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));

        if comments.is_empty() {
            return Err(AppError::EmptyResult("comments"));
        }
        Ok(comments)
    }
}

// ---------------------------------------------------------------------------
// Users and referrals
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemUsers {
    rows: Mutex<Vec<User>>,
}

impl MemUsers {
    pub fn insert(&self, user: User) {
        self.rows.lock().unwrap().push(user);
    }
}

#[async_trait]
impl UserStore for MemUsers {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }
}

#[derive(Default)]
pub struct MemReferrals {
    rows: Mutex<Vec<Referral>>,
}

impl MemReferrals {
    pub fn insert(&self, referral: Referral) {
        self.rows.lock().unwrap().push(referral);
    }
}

#[async_trait]
impl ReferralStore for MemReferrals {
    async fn active_by_code(&self, referral_code: &str) -> Result<Vec<Referral>, AppError> {
        let referrals: Vec<Referral> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.active && r.referral_code == referral_code)
            .cloned()
            .collect();

        if referrals.is_empty() {
            return Err(AppError::EmptyResult("referrals"));
        }
        Ok(referrals)
    }
}

// ---------------------------------------------------------------------------
// CRM double
// ---------------------------------------------------------------------------

/// Scripted CRM: returns the configured ids/views and records every call.
#[derive(Default)]
pub struct StubCrm {
    pub next_deal_id: Mutex<i64>,
    pub next_comment_id: Mutex<i64>,
    pub leads: Mutex<HashMap<i64, LeadView>>,
    pub comments: Mutex<HashMap<i64, CommentView>>,
    pub fail_deals: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl StubCrm {
    pub fn new(next_deal_id: i64, next_comment_id: i64) -> Self {
        Self {
            next_deal_id: Mutex::new(next_deal_id),
            next_comment_id: Mutex::new(next_comment_id),
            ..Default::default()
        }
    }

    pub fn put_lead(&self, id: i64, view: LeadView) {
        self.leads.lock().unwrap().insert(id, view);
    }

    pub fn put_comment(&self, id: i64, view: CommentView) {
        self.comments.lock().unwrap().insert(id, view);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn not_found(what: &str) -> CrmError {
    CrmError::Api {
        error: "NOT_FOUND".into(),
        description: format!("{what} not found"),
    }
}

#[async_trait]
impl CrmClient for StubCrm {
    async fn send_deal(&self, draft: &CreateLeadPayload, user: &User) -> Result<CrmId, CrmError> {
        self.record(format!("send_deal:{}:{}", user.id, draft.name));
        if *self.fail_deals.lock().unwrap() {
            return Err(CrmError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let mut next = self.next_deal_id.lock().unwrap();
        let id = *next;
        *next += 1;
        Ok(CrmId { id })
    }

    async fn get_lead(&self, id: i64) -> Result<LeadView, CrmError> {
        self.record(format!("get_lead:{id}"));
        self.leads.lock().unwrap().get(&id).cloned().ok_or_else(|| not_found("deal"))
    }

    async fn send_comment(&self, lead_id: i64, text: &str) -> Result<CrmId, CrmError> {
        self.record(format!("send_comment:{lead_id}:{text}"));
        let mut next = self.next_comment_id.lock().unwrap();
        let id = *next;
        *next += 1;
        Ok(CrmId { id })
    }

    async fn get_comment(&self, id: i64) -> Result<CommentView, CrmError> {
        self.record(format!("get_comment:{id}"));
        self.comments.lock().unwrap().get(&id).cloned().ok_or_else(|| not_found("comment"))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        jwt_secret: "test-secret".into(),
        server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        request_timeout: Duration::from_secs(30),
        db_max_connections: 1,
        manager_user_id: MANAGER_USER_ID,
        bitrix: BitrixConfig {
            incoming_webhook_url: "https://example.bitrix24.ru/rest/1/abc".into(),
            funnel_id: FUNNEL_ID.into(),
            outgoing_webhook_auth: DEAL_TOKEN.into(),
            auth_token_comment: COMMENT_TOKEN.into(),
            timeout: Duration::from_secs(5),
            reward_fields: RewardFieldCodes {
                internet: "UF_CRM_INTERNET_PAYMENT".into(),
                cleaning: "UF_CRM_CLEANING_PAYMENT".into(),
                shipping: "UF_CRM_SHIPPING_PAYMENT".into(),
            },
        },
    }
}

pub fn user(id: i64, roles: &[&str]) -> User {
    // Cost 4 keeps the tests fast.
    let password_hash = bcrypt::hash(PASSWORD, 4).unwrap();
    User {
        id,
        email: format!("agent{id}@example.com"),
        password_hash,
        name: format!("Agent {id}"),
        phone_number: "+79000000000".into(),
        city: "Kazan".into(),
        telegram: format!("@agent{id}"),
        referral_code: format!("REF{id}"),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        created_at: Utc::now(),
    }
}

pub fn lead(id: i64, user_id: i64, created_at: DateTime<Utc>) -> Lead {
    Lead {
        id,
        user_id,
        fio: format!("Client {id}"),
        address: "Lenina 1".into(),
        phone_number: "+79001234567".into(),
        status_id: 0,
        internet: true,
        cleaning: false,
        shipping: false,
        reward_internet: Decimal::ZERO,
        reward_cleaning: Decimal::ZERO,
        reward_shipping: Decimal::ZERO,
        created_at,
        completed_at: None,
        payment_at: None,
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

pub fn draft(name: &str) -> CreateLeadPayload {
    CreateLeadPayload {
        name: name.into(),
        phone_number: "+79001234567".into(),
        address: "Lenina 1".into(),
        comment: String::new(),
        reward_internet: Decimal::ZERO,
        reward_cleaning: Decimal::ZERO,
        reward_shipping: Decimal::ZERO,
        is_internet: true,
        is_shipping: false,
        is_cleaning: false,
    }
}

pub fn ctx(user_id: i64) -> RequestContext {
    RequestContext {
        user_id,
        roles: vec![Role::User],
    }
}

pub fn manager_ctx(user_id: i64) -> RequestContext {
    RequestContext {
        user_id,
        roles: vec![Role::Manager],
    }
}

/// Everything a test needs: the wired state plus handles on the doubles.
pub struct TestApp {
    pub state: AppState,
    pub leads: Arc<MemLeads>,
    pub comments: Arc<MemComments>,
    pub users: Arc<MemUsers>,
    pub referrals: Arc<MemReferrals>,
    pub crm: Arc<StubCrm>,
}

impl TestApp {
    /// Users 7 and 8 are agents, user 1 is a manager.
    pub fn new() -> Self {
        let leads = Arc::new(MemLeads::default());
        let comments = Arc::new(MemComments::default());
        let users = Arc::new(MemUsers::default());
        let referrals = Arc::new(MemReferrals::default());
        let crm = Arc::new(StubCrm::new(1001, 5001));

        users.insert(user(7, &["user"]));
        users.insert(user(8, &["user"]));
        users.insert(user(1, &["manager"]));

        let state = AppState::from_parts(
            test_config(),
            crm.clone(),
            leads.clone(),
            comments.clone(),
            users.clone(),
            referrals.clone(),
        );

        Self {
            state,
            leads,
            comments,
            users,
            referrals,
            crm,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn token(&self, user_id: i64, roles: &[Role]) -> String {
        self.state.auth_service.create_token(user_id, roles).unwrap()
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

pub async fn send_json(
    router: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let (status, _, bytes) = send(router, builder.body(body).unwrap()).await;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn post_form(router: Router, uri: &str, fields: &[(&str, &str)]) -> StatusCode {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();

    send(router, request).await.0
}

// Enough for the bracketed Bitrix keys.
fn urlencode(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => {
                let mut buf = [0u8; 4];
                other
                    .encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}
