use serde::{Deserialize, Serialize};

/// Upstream JSON-RPC method names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Method {
    Login,
    Submit,
    Job,
    Keepalived,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Login => "login",
            Self::Submit => "submit",
            Self::Job => "job",
            Self::Keepalived => "keepalived",
            Self::Other(method) => method,
        }
    }
}

impl From<String> for Method {
    fn from(method: String) -> Self {
        match method.as_str() {
            "login" => Self::Login,
            "submit" => Self::Submit,
            "job" => Self::Job,
            "keepalived" => Self::Keepalived,
            _ => Self::Other(method),
        }
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_owned()
    }
}
