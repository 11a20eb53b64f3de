use crate::auth::{parse_role_from_jwt, parse_subject_from_jwt};
use crate::models::*;
use crate::session::{LogoutReason, Role, Session, SessionStore};
use crate::upload::ResumeFile;
use crate::{Error, Result};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::header;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const VALIDATE_PATH: &str = "/api/auth/validate";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const ME_PATH: &str = "/api/auth/me";
pub const CHANGE_PASSWORD_PATH: &str = "/api/auth/change-password";

/// Server-side minimum, checked locally so a short password never leaves the machine
pub const MIN_PASSWORD_CHARS: usize = 6;
/// Shortest resume text the text-only analyzer accepts
pub const MIN_ANALYZE_TEXT_CHARS: usize = 100;

/// Requests to these never trigger the refresh-and-replay path
const AUTH_ENDPOINTS: [&str; 3] = [LOGIN_PATH, REGISTER_PATH, REFRESH_PATH];

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "patch" => Ok(HttpMethod::Patch),
            "delete" => Ok(HttpMethod::Delete),
            _ => Err(Error::Validation(format!("unknown method: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// A resume file under the "file" form field, plus extra text fields
    Multipart {
        file: ResumeFile,
        fields: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: &str) -> Self {
        ApiRequest {
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, file: ResumeFile, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Multipart { file, fields };
        self
    }

    pub fn is_auth_endpoint(&self) -> bool {
        AUTH_ENDPOINTS.contains(&self.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `Value::Null` for empty or non-JSON error bodies
    pub body: Value,
}

/// One HTTP round trip. `bearer` is attached as an `Authorization: Bearer` header when present.
pub trait HttpTransport {
    fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::blocking::Client,
    host: String,
}

impl ReqwestTransport {
    pub fn new(host: &str) -> Result<Self> {
        let http_client = reqwest::blocking::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(ReqwestTransport {
            http_client,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    fn auth_headers(bearer: Option<&str>) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = bearer {
            let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::Validation("token is not a valid header value".to_string()))?;
            auth_value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth_value);
        };
        Ok(headers)
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        log::debug!(
            "HTTP {:?} endpoint={} query={:?}",
            request.method,
            request.path,
            request.query
        );
        let url = format!("{}{}", self.host, request.path);
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut req = self
            .http_client
            .request(method, url)
            .headers(Self::auth_headers(bearer)?)
            .query(&request.query);
        req = match &request.body {
            RequestBody::Empty => req,
            RequestBody::Json(b) => req.json(b),
            RequestBody::Multipart { file, fields } => {
                let part = reqwest::blocking::multipart::Part::bytes(file.bytes.clone())
                    .file_name(file.filename.clone())
                    .mime_str(file.mime)?;
                let mut form = reqwest::blocking::multipart::Form::new().part("file", part);
                for (k, v) in fields.iter() {
                    form = form.text(k.clone(), v.clone());
                }
                req.multipart(form)
            }
        };
        let res = req.send()?;
        let status = res.status();
        let text = res.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else if status.is_success() {
            serde_json::from_str(&text)
                .map_err(|e| Error::Malformed(format!("{} returned non-JSON: {e}", request.path)))?
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a response onto the error taxonomy, passing successful bodies through.
fn check_status(resp: ApiResponse) -> Result<Value> {
    let message = error_message(&resp.body);
    match resp.status {
        200..=299 => Ok(resp.body),
        401 => Err(Error::Unauthorized(
            message.unwrap_or_else(|| "session expired".to_string()),
        )),
        403 => Err(Error::Forbidden(
            message.unwrap_or_else(|| "access denied".to_string()),
        )),
        400..=499 if message.is_some() => Err(Error::Rejected(message.unwrap_or_default())),
        status => Err(Error::Server {
            status,
            message: message.unwrap_or_else(|| "unknown".to_string()),
        }),
    }
}

/// Ids end up in URL paths; keep them to plain tokens.
fn check_id(id: &str) -> Result<&str> {
    lazy_static! {
        static ref ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap();
    }
    if ID_RE.is_match(id) {
        Ok(id)
    } else {
        Err(Error::Validation(format!("not a valid id: {:?}", id)))
    }
}

/// Result of checking a stored token against the server at startup
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Validation {
    NoSession,
    Valid,
    /// Server rejected the token; the session has been torn down
    Invalid,
    /// Couldn't reach a verdict (network or server trouble); the session was kept
    Unreachable,
}

/// Authenticated client for the resume analysis REST API.
///
/// Owns the `SessionStore`: tokens are read from it for every request, and refreshes or forced
/// logouts are written back to it.
pub struct ApiClient {
    transport: Box<dyn HttpTransport>,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(host: &str, session: SessionStore) -> Result<Self> {
        Ok(Self::with_transport(
            Box::new(ReqwestTransport::new(host)?),
            session,
        ))
    }

    pub fn with_transport(transport: Box<dyn HttpTransport>, session: SessionStore) -> Self {
        ApiClient { transport, session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionStore {
        &mut self.session
    }

    /// Sends a request with the current access token.
    ///
    /// A 401 on anything but an auth endpoint gets exactly one refresh attempt. If that works the
    /// request is replayed once with the new token and the replay's outcome is returned as-is. If
    /// it doesn't, the session is torn down and the original 401 is returned.
    pub fn execute(&mut self, request: ApiRequest) -> Result<Value> {
        let token = self.session.access_token();
        let resp = self.transport.send(&request, token.as_deref())?;
        if resp.status == 401 && !request.is_auth_endpoint() {
            let original = Error::Unauthorized(
                error_message(&resp.body).unwrap_or_else(|| "session expired".to_string()),
            );
            return self.refresh_and_replay(&request, original);
        }
        check_status(resp)
    }

    fn refresh_and_replay(&mut self, request: &ApiRequest, original: Error) -> Result<Value> {
        match self.refresh_access_token() {
            Ok(token) => {
                debug!("replaying {} with refreshed token", request.path);
                let resp = self.transport.send(request, Some(&token))?;
                check_status(resp)
            }
            // already torn down (eg by another process); listeners have heard about it
            Err(e)
                if !self.session.is_authenticated() && self.session.refresh_token().is_none() =>
            {
                debug!("token refresh failed after the session ended: {e}");
                Err(original)
            }
            Err(e) => {
                warn!("token refresh failed, clearing session: {e}");
                if let Err(store_err) = self.session.logout(LogoutReason::RefreshFailed) {
                    warn!("session teardown incomplete: {store_err}");
                }
                Err(original)
            }
        }
    }

    /// Swaps the stored refresh token for a new access token. Does not tear anything down on
    /// failure; that is up to the caller.
    pub fn refresh_access_token(&mut self) -> Result<String> {
        let refresh = self
            .session
            .refresh_token()
            .ok_or_else(|| Error::Unauthorized("no refresh token stored".to_string()))?;
        let resp = self
            .transport
            .send(&ApiRequest::post(REFRESH_PATH), Some(&refresh))?;
        let body = check_status(resp)?;
        if body["success"] == Value::Bool(false) {
            return Err(Error::Rejected(
                error_message(&body).unwrap_or_else(|| "refresh rejected".to_string()),
            ));
        }
        let refreshed: RefreshResponse = serde_json::from_value(body)?;
        self.session.update_access_token(&refreshed.access_token)?;
        info!("access token refreshed");
        Ok(refreshed.access_token)
    }

    fn establish_from(&mut self, data: AuthData) -> Result<Session> {
        let role = match data.reported_role() {
            Some(r) => r,
            None => parse_role_from_jwt(&data.access_token)
                .ok()
                .flatten()
                .unwrap_or_default(),
        };
        let session = Session {
            access_token: data.access_token,
            refresh_token: Some(data.refresh_token),
            role,
            display_name: data.user.name,
        };
        self.session.establish(session.clone())?;
        Ok(session)
    }

    /// Creates a new session, and updates the session store with the result
    pub fn login(&mut self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "email and password are required".to_string(),
            ));
        }
        let body = self.execute(ApiRequest::post(LOGIN_PATH).json(json!({
            "email": email,
            "password": password,
        })))?;
        self.establish_from(decode_data(body)?)
    }

    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<Session> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if !email.contains('@') || !email.contains('.') {
            return Err(Error::Validation("invalid email format".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        let body = self.execute(ApiRequest::post(REGISTER_PATH).json(json!({
            "name": name,
            "email": email,
            "password": password,
        })))?;
        self.establish_from(decode_data(body)?)
    }

    /// Tells the server (best effort, never refreshes) and then clears the local session.
    pub fn logout(&mut self) -> Result<()> {
        if let Some(token) = self.session.access_token() {
            match self
                .transport
                .send(&ApiRequest::post(LOGOUT_PATH), Some(&token))
            {
                Ok(resp) => debug!("server logout status={}", resp.status),
                Err(e) => debug!("server logout failed, clearing locally anyway: {e}"),
            }
        }
        self.session.logout(LogoutReason::Explicit)
    }

    /// Startup check of the stored token. Bypasses the refresh path: a rejected token means the
    /// session is over. Transient failures keep the session (fail open).
    pub fn validate_session(&mut self) -> Result<Validation> {
        let token = match self.session.access_token() {
            None => return Ok(Validation::NoSession),
            Some(t) => t,
        };
        let resp = match self
            .transport
            .send(&ApiRequest::get(VALIDATE_PATH), Some(&token))
        {
            Ok(r) => r,
            Err(e) => {
                warn!("could not validate session, keeping it: {e}");
                return Ok(Validation::Unreachable);
            }
        };
        match resp.status {
            // flask-jwt-extended answers 422 for tokens it can't even decode
            401 | 422 => {
                self.session.logout(LogoutReason::InvalidToken)?;
                Ok(Validation::Invalid)
            }
            200..=299 => {
                let parsed: ValidateResponse = serde_json::from_value(resp.body)?;
                if !parsed.valid {
                    self.session.logout(LogoutReason::InvalidToken)?;
                    return Ok(Validation::Invalid);
                }
                if let Some(user) = parsed.user {
                    let role = user
                        .role
                        .as_deref()
                        .map(Role::from_stored)
                        .unwrap_or_default();
                    self.session.update_profile(role, user.name.as_deref())?;
                }
                Ok(Validation::Valid)
            }
            status => {
                warn!("session validation got status {status}, keeping session");
                Ok(Validation::Unreachable)
            }
        }
    }

    pub fn me(&mut self) -> Result<AuthUser> {
        let body = self.execute(ApiRequest::get(ME_PATH))?;
        decode_data(body)
    }

    /// Updates the profile (display name and/or free-form preferences). The stored display name
    /// and role follow whatever the server sends back.
    pub fn update_account(
        &mut self,
        name: Option<&str>,
        preferences: Option<Value>,
    ) -> Result<AuthUser> {
        let mut update = serde_json::Map::new();
        if let Some(n) = name {
            let n = n.trim();
            if n.is_empty() {
                return Err(Error::Validation("name can not be blank".to_string()));
            }
            update.insert("name".to_string(), json!(n));
        }
        if let Some(p) = preferences {
            update.insert("preferences".to_string(), p);
        }
        if update.is_empty() {
            return Err(Error::Validation("no fields to update".to_string()));
        }
        let body =
            self.execute(ApiRequest::new(HttpMethod::Put, ME_PATH).json(Value::Object(update)))?;
        let user: AuthUser = decode_data(body)?;
        let role = match user.role.as_deref() {
            Some(r) => Role::from_stored(r),
            None => self.session.current_role(),
        };
        self.session.update_profile(role, user.name.as_deref())?;
        Ok(user)
    }

    pub fn change_password(&mut self, current: &str, new: &str) -> Result<String> {
        if current.is_empty() || new.is_empty() {
            return Err(Error::Validation("both passwords are required".to_string()));
        }
        if new.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::Validation(format!(
                "new password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        let result = self.execute(ApiRequest::post(CHANGE_PASSWORD_PATH).json(json!({
            "current_password": current,
            "new_password": new,
        })));
        match result {
            Ok(body) => decode_ack(body),
            // a 401 that survives a successful refresh is the wrong current password
            Err(Error::Unauthorized(msg)) if self.session.is_authenticated() => {
                Err(Error::Rejected(msg))
            }
            Err(e) => Err(e),
        }
    }

    pub fn upload_resume(&mut self, file: &ResumeFile) -> Result<UploadResult> {
        let body = self.execute(
            ApiRequest::post("/api/resume/upload").multipart(file.clone(), Vec::new()),
        )?;
        decode_data(body)
    }

    pub fn analyze_uploaded(
        &mut self,
        resume_id: &str,
        job_description: &str,
    ) -> Result<SkillAnalysis> {
        let body = self.execute(ApiRequest::post("/api/resume/analyze").json(json!({
            "resume_id": check_id(resume_id)?,
            "job_description": job_description,
        })))?;
        decode_data(body)
    }

    pub fn ats_score(&mut self, resume_id: &str, job_description: &str) -> Result<AtsScore> {
        let body = self.execute(ApiRequest::post("/api/resume/ats-score").json(json!({
            "resume_id": check_id(resume_id)?,
            "job_description": job_description,
        })))?;
        decode_data(body)
    }

    /// Between the requests of a multi-step operation: picks up changes other processes made to
    /// the session file, and stops if they logged us out.
    fn resync_between_steps(&mut self) -> Result<()> {
        self.session.resync()?;
        if !self.session.is_authenticated() {
            return Err(Error::Unauthorized("signed out during the operation".to_string()));
        }
        Ok(())
    }

    /// Upload, skill analysis, ATS scoring and job recommendations in one go.
    pub fn analyze(&mut self, file: &ResumeFile, job_description: &str) -> Result<AnalysisResult> {
        let uploaded = self.upload_resume(file)?;
        info!(
            "uploaded {} as {} ({} words)",
            uploaded.filename, uploaded.resume_id, uploaded.word_count
        );
        self.resync_between_steps()?;
        let analysis = self.analyze_uploaded(&uploaded.resume_id, job_description)?;
        self.resync_between_steps()?;
        let score = self.ats_score(&uploaded.resume_id, job_description)?;
        self.resync_between_steps()?;
        let jobs = self.job_recommendations(10, 40)?;
        AnalysisResult::assemble(
            analysis,
            score,
            jobs,
            !job_description.trim().is_empty(),
        )
    }

    /// Scores pasted text directly. Nothing is uploaded or stored.
    pub fn analyze_text(&mut self, text: &str, job_description: &str) -> Result<TextAnalysis> {
        if text.chars().count() < MIN_ANALYZE_TEXT_CHARS {
            return Err(Error::Validation(format!(
                "resume text must be at least {MIN_ANALYZE_TEXT_CHARS} characters"
            )));
        }
        let body = self.execute(ApiRequest::post("/api/resume/analyze-text").json(json!({
            "text": text,
            "job_description": job_description,
        })))?;
        let analysis: TextAnalysis = decode_data(body)?;
        if !(0.0..=100.0).contains(&analysis.ats_score) {
            return Err(Error::Malformed(format!(
                "ATS score out of range: {}",
                analysis.ats_score
            )));
        }
        Ok(analysis)
    }

    pub fn skills(&mut self, resume_id: &str) -> Result<BTreeMap<String, SkillCategory>> {
        let path = format!("/api/resume/skills/{}", check_id(resume_id)?);
        let body = self.execute(ApiRequest::get(&path))?;
        let data: Value = decode_data(body)?;
        serde_json::from_value(data["skills"].clone())
            .map_err(|e| Error::Malformed(format!("unexpected skills shape: {e}")))
    }

    pub fn history(&mut self, limit: u32, skip: u32) -> Result<Vec<HistoryEntry>> {
        let body = self.execute(
            ApiRequest::get("/api/resume/history")
                .query("limit", limit)
                .query("skip", skip),
        )?;
        decode_data(body)
    }

    /// Sends a resume through the ATS converter. Keywords, if any, go along as a JSON array.
    pub fn convert_ats(&mut self, file: &ResumeFile, job_keywords: &[String]) -> Result<ConvertResult> {
        let mut fields = Vec::new();
        let keywords: Vec<&str> = job_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if !keywords.is_empty() {
            fields.push(("job_keywords".to_string(), serde_json::to_string(&keywords)?));
        }
        let body = self.execute(
            ApiRequest::post("/api/resume/convert-ats").multipart(file.clone(), fields),
        )?;
        decode_data(body)
    }

    pub fn job_recommendations(&mut self, limit: u32, min_match: u32) -> Result<Vec<Job>> {
        let body = self.execute(
            ApiRequest::get("/api/jobs/recommendations")
                .query("limit", limit)
                .query("min_match", min_match),
        )?;
        decode_data(body)
    }

    pub fn search_jobs(&mut self, query: &str, location: Option<&str>) -> Result<Vec<Job>> {
        let mut req = ApiRequest::get("/api/jobs/search").query("q", query);
        if let Some(loc) = location {
            req = req.query("location", loc);
        }
        let body = self.execute(req)?;
        decode_data(body)
    }

    /// The endpoint toggles: returns whether the job is saved afterwards.
    pub fn toggle_saved_job(&mut self, job_id: &str) -> Result<bool> {
        let path = format!("/api/jobs/save/{}", check_id(job_id)?);
        let body = self.execute(ApiRequest::post(&path))?;
        let saved = body["saved"].as_bool();
        decode_ack(body)?;
        saved.ok_or_else(|| Error::Malformed("response is missing 'saved'".to_string()))
    }

    pub fn saved_jobs(&mut self) -> Result<Vec<String>> {
        let body = self.execute(ApiRequest::get("/api/jobs/saved"))?;
        decode_data(body)
    }

    pub fn submit_feedback(
        &mut self,
        kind: FeedbackKind,
        subject: &str,
        message: &str,
    ) -> Result<String> {
        if subject.trim().is_empty() || message.trim().is_empty() {
            return Err(Error::Validation(
                "subject and message are required".to_string(),
            ));
        }
        let body = self.execute(ApiRequest::post("/api/feedback").json(json!({
            "type": kind,
            "subject": subject.trim(),
            "message": message.trim(),
        })))?;
        decode_ack(body)
    }

    pub fn admin_stats(&mut self) -> Result<AdminStats> {
        let body = self.execute(ApiRequest::get("/api/admin/stats"))?;
        decode_data(body)
    }

    pub fn admin_users(&mut self) -> Result<Vec<UserSummary>> {
        let body = self.execute(ApiRequest::get("/api/admin/users"))?;
        decode_data(body)
    }

    pub fn admin_update_user(
        &mut self,
        user_id: &str,
        role: Option<Role>,
        status: Option<&str>,
    ) -> Result<String> {
        let mut update = serde_json::Map::new();
        if let Some(r) = role {
            update.insert("role".to_string(), json!(r));
        }
        if let Some(s) = status {
            update.insert("status".to_string(), json!(s));
        }
        if update.is_empty() {
            return Err(Error::Validation("no fields to update".to_string()));
        }
        let path = format!("/api/admin/users/{}", check_id(user_id)?);
        let body = self.execute(
            ApiRequest::new(HttpMethod::Patch, &path).json(Value::Object(update)),
        )?;
        decode_ack(body)
    }

    /// Soft-deletes a user. Deleting the account the current token belongs to is refused before
    /// any request is made.
    pub fn admin_delete_user(&mut self, user_id: &str) -> Result<String> {
        let path = format!("/api/admin/users/{}", check_id(user_id)?);
        let own_id = self
            .session
            .access_token()
            .and_then(|t| parse_subject_from_jwt(&t).ok());
        if own_id.as_deref() == Some(user_id) {
            return Err(Error::Validation(
                "you cannot delete your own account".to_string(),
            ));
        }
        let body = self.execute(ApiRequest::new(HttpMethod::Delete, &path))?;
        decode_ack(body)
    }

    pub fn admin_feedback(&mut self) -> Result<Vec<FeedbackItem>> {
        let body = self.execute(ApiRequest::get("/api/admin/feedback"))?;
        decode_data(body)
    }

    pub fn admin_resolve_feedback(&mut self, feedback_id: &str) -> Result<String> {
        let path = format!("/api/admin/feedback/{}/resolve", check_id(feedback_id)?);
        let body = self.execute(ApiRequest::new(HttpMethod::Patch, &path))?;
        decode_ack(body)
    }

    pub fn admin_delete_feedback(&mut self, feedback_id: &str) -> Result<String> {
        let path = format!("/api/admin/feedback/{}", check_id(feedback_id)?);
        let body = self.execute(ApiRequest::new(HttpMethod::Delete, &path))?;
        decode_ack(body)
    }

    fn admin_page<T: for<'de> serde::Deserialize<'de>>(
        &mut self,
        path: &str,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Page<T>> {
        let mut req = ApiRequest::get(path)
            .query("page", page.max(1))
            .query("limit", limit);
        if let Some(s) = search.map(str::trim).filter(|s| !s.is_empty()) {
            req = req.query("search", s);
        }
        let body = self.execute(req)?;
        Page::decode(body)
    }

    pub fn admin_resumes(
        &mut self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<AdminResumePage> {
        self.admin_page("/api/admin/resumes", page, limit, search)
    }

    pub fn admin_delete_resume(&mut self, resume_id: &str) -> Result<String> {
        let path = format!("/api/admin/resumes/{}", check_id(resume_id)?);
        let body = self.execute(ApiRequest::new(HttpMethod::Delete, &path))?;
        decode_ack(body)
    }

    pub fn admin_ats_resumes(
        &mut self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Page<AtsResumeSummary>> {
        self.admin_page("/api/admin/ats-resumes", page, limit, search)
    }

    pub fn admin_delete_ats_resume(&mut self, id: &str) -> Result<String> {
        let path = format!("/api/admin/ats-resumes/{}", check_id(id)?);
        let body = self.execute(ApiRequest::new(HttpMethod::Delete, &path))?;
        decode_ack(body)
    }

    pub fn admin_recommendations(
        &mut self,
        page: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<Page<RecommendationRecord>> {
        self.admin_page("/api/admin/recommendations", page, limit, search)
    }

    pub fn admin_ats_scores(&mut self, page: u32, limit: u32) -> Result<Page<AtsScoreRecord>> {
        self.admin_page("/api/admin/ats-scores", page, limit, None)
    }

    pub fn admin_skill_analyses(
        &mut self,
        page: u32,
        limit: u32,
    ) -> Result<Page<SkillAnalysisRecord>> {
        self.admin_page("/api/admin/skill-analyses", page, limit, None)
    }

    /// Escape hatch for endpoints without a typed wrapper. Still goes through refresh-retry.
    pub fn raw(
        &mut self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<Value> {
        if !path.starts_with("/api/") {
            return Err(Error::Validation(format!(
                "path should start with /api/: {}",
                path
            )));
        }
        let mut req = ApiRequest::new(method, path);
        req.query = query;
        if let Some(b) = body {
            req.body = RequestBody::Json(b);
        }
        self.execute(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoint_detection() {
        assert!(ApiRequest::post(LOGIN_PATH).is_auth_endpoint());
        assert!(ApiRequest::post(REFRESH_PATH).is_auth_endpoint());
        assert!(!ApiRequest::get(VALIDATE_PATH).is_auth_endpoint());
        assert!(!ApiRequest::get("/api/jobs/saved").is_auth_endpoint());
    }

    #[test]
    fn test_check_status() {
        let ok = ApiResponse {
            status: 200,
            body: json!({"success": true}),
        };
        assert!(check_status(ok).is_ok());

        let conflict = ApiResponse {
            status: 409,
            body: json!({"error": "Email already registered"}),
        };
        match check_status(conflict) {
            Err(Error::Rejected(m)) => assert_eq!(m, "Email already registered"),
            other => panic!("unexpected: {:?}", other),
        }

        let bare_404 = ApiResponse {
            status: 404,
            body: Value::Null,
        };
        assert!(matches!(
            check_status(bare_404),
            Err(Error::Server { status: 404, .. })
        ));

        let forbidden = ApiResponse {
            status: 403,
            body: json!({"error": "Admin access required"}),
        };
        assert!(matches!(check_status(forbidden), Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_check_id() {
        assert!(check_id("65a1f0c2e4b0a1b2c3d4e5f6").is_ok());
        assert!(check_id("../admin").is_err());
        assert!(check_id("").is_err());
        assert!(check_id("a/b").is_err());
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(HttpMethod::from_str("patch").unwrap(), HttpMethod::Patch);
        assert!(HttpMethod::from_str("PUT").is_err());
    }
}
