use serde_json::{Value, json};

pub struct MockResponses;

impl MockResponses {
    pub fn login_response(id: u64, session_id: &str, job: Value) -> Value {
        json!({
            "id": id,
            "jsonrpc": "2.0",
            "error": null,
            "result": {
                "id": session_id,
                "job": job,
                "status": "OK"
            }
        })
    }

    pub fn job_notification(job: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "method": "job",
            "params": job
        })
    }

    pub fn submit_ok(id: u64) -> Value {
        json!({
            "id": id,
            "jsonrpc": "2.0",
            "error": null,
            "result": { "status": "OK" }
        })
    }

    pub fn keepalived_response(id: u64) -> Value {
        json!({
            "id": id,
            "jsonrpc": "2.0",
            "error": null,
            "result": { "status": "KEEPALIVED" }
        })
    }

    pub fn error_response(id: Option<u64>, message: &str, code: i32) -> Value {
        json!({
            "id": id,
            "jsonrpc": "2.0",
            "error": { "code": code, "message": message }
        })
    }

    pub fn unknown_method_response(id: Option<u64>, method: &str) -> Value {
        Self::error_response(id, &format!("Unknown method: {}", method), -1)
    }
}
