use anyhow::anyhow;
pub use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use resumelens::guard::navigate;
use resumelens::storage::FileStore;
use resumelens::{Navigation, Route, SessionStore};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod pretty;

/// Represents fields/content specified on the command line.
///
/// Sort of like HTTPie. Query parameters are '==', body values (JSON) are '='. Only single-level
/// body values are allowed currently, not JSON Pointer assignment.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ArgField {
    Query(String, serde_json::Value),
    Body(String, serde_json::Value),
}

impl FromStr for ArgField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref FIELD_RE: Regex = Regex::new(r"^([a-zA-Z_]+)=(=)?(.*)$").unwrap();
        }
        if let Some(captures) = FIELD_RE.captures(s) {
            let key = captures[1].to_string();
            let val =
                Value::from_str(&captures[3]).unwrap_or(Value::String(captures[3].to_string()));
            let val = match val {
                Value::String(s) if s.is_empty() => Value::Null,
                _ => val,
            };
            if captures.get(2).is_some() {
                Ok(ArgField::Query(key, val))
            } else {
                Ok(ArgField::Body(key, val))
            }
        } else {
            Err(anyhow!("could not parse as a field assignment: {}", s))
        }
    }
}

#[test]
fn test_argfield() {
    use serde_json::json;
    assert_eq!(
        ArgField::from_str("limit==10").unwrap(),
        ArgField::Query("limit".to_string(), json!(10)),
    );
    assert_eq!(
        ArgField::from_str("role=\"admin\"").unwrap(),
        ArgField::Body("role".to_string(), Value::String("admin".to_string()))
    );
    assert_eq!(
        ArgField::from_str("role=admin").unwrap(),
        ArgField::Body("role".to_string(), Value::String("admin".to_string()))
    );
    assert_eq!(
        ArgField::from_str("search==").unwrap(),
        ArgField::Query("search".to_string(), Value::Null),
    );

    assert!(ArgField::from_str("a").is_err());
    assert!(ArgField::from_str("").is_err());
    assert!(ArgField::from_str("resume.id=3").is_err());

    assert!(ArgField::from_str("subject=\"other value\"").is_ok());
}

/// Query parameters, in command-line order. Null values are sent as empty strings.
pub fn query_from_fields(fields: &[ArgField]) -> Vec<(String, String)> {
    fields
        .iter()
        .filter_map(|f| match f {
            ArgField::Query(k, Value::String(s)) => Some((k.to_string(), s.to_string())),
            ArgField::Query(k, Value::Null) => Some((k.to_string(), String::new())),
            ArgField::Query(k, v) => Some((k.to_string(), v.to_string())),
            ArgField::Body(..) => None,
        })
        .collect()
}

/// Consumes the entire Vec of fields passed in. `None` if there were no body fields.
pub fn value_from_fields(fields: Vec<ArgField>) -> Option<Value> {
    let map: BTreeMap<String, Value> = fields
        .into_iter()
        .filter_map(|f| match f {
            ArgField::Body(k, v) => Some((k, v)),
            ArgField::Query(..) => None,
        })
        .collect();
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(serde_json::map::Map::from_iter(map)))
    }
}

#[test]
fn test_fields_split() {
    use serde_json::json;
    let fields = vec![
        ArgField::from_str("page==2").unwrap(),
        ArgField::from_str("status=active").unwrap(),
        ArgField::from_str("search==jane").unwrap(),
    ];
    assert_eq!(
        query_from_fields(&fields),
        vec![
            ("page".to_string(), "2".to_string()),
            ("search".to_string(), "jane".to_string())
        ]
    );
    assert_eq!(value_from_fields(fields), Some(json!({"status": "active"})));
    assert_eq!(value_from_fields(vec![]), None);
}

/// Comma-separated keyword list, as accepted by `convert --keywords`
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| k.to_string())
        .collect()
}

#[test]
fn test_parse_keywords() {
    assert_eq!(
        parse_keywords("python, aws,,  Kubernetes "),
        vec!["python", "aws", "Kubernetes"]
    );
    assert!(parse_keywords(" , ").is_empty());
}

/// Opens the durable session store: the given file, or the per-user default.
pub fn open_session(path: Option<&Path>) -> Result<SessionStore> {
    let path: PathBuf = match path {
        Some(p) => p.to_path_buf(),
        None => FileStore::default_path()?,
    };
    log::debug!("session file: {}", path.display());
    Ok(SessionStore::new(Box::new(FileStore::open(&path)?)))
}

/// Runs the route guards for a command's page. Errors carry where the user should go instead.
pub fn check_route(session: &SessionStore, route: Route) -> Result<()> {
    match navigate(session, route) {
        Navigation::Render(_) => Ok(()),
        Navigation::Redirect {
            to: Route::Login,
            from: Some(from),
        } => Err(anyhow!(
            "login required for {}; run: resumelens login --next {}",
            from,
            from
        )),
        Navigation::Redirect { to, .. } => Err(anyhow!(
            "{} is not available to the {} role (home is {})",
            route,
            session.current_role(),
            to
        )),
    }
}

#[test]
fn test_check_route() {
    use resumelens::{Role, Session};
    let mut session = SessionStore::ephemeral();
    assert!(check_route(&session, Route::Feedback).is_ok());
    let err = check_route(&session, Route::Analyze).unwrap_err();
    assert!(err.to_string().contains("--next /analyze"));

    session
        .establish(Session {
            access_token: "t".to_string(),
            refresh_token: None,
            role: Role::User,
            display_name: None,
        })
        .unwrap();
    assert!(check_route(&session, Route::Analyze).is_ok());
    let err = check_route(&session, Route::AdminDashboard).unwrap_err();
    assert!(err.to_string().contains("/dashboard"));
}
