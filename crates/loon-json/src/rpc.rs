//! JSON-RPC request extraction and response shapes.
//!
//! Supports both protocol versions: requests carrying `"jsonrpc": "2.0"`
//! follow version 2 rules, everything else is treated as version 1.

use tracing::debug;

use crate::error::Result;
use crate::storage::StoragePtr;
use crate::string::Str;
use crate::value::Value;

/// Reasons a request cannot be served.
///
/// The five standard JSON-RPC codes come first; the remaining variants
/// pinpoint which shape rule a malformed request broke, and all map onto
/// the invalid-request code on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("An error occurred on the server while parsing the JSON text.")]
    ParseError,

    #[error("The JSON sent is not a valid Request object")]
    InvalidRequest,

    #[error("The method does not exist or is not available")]
    MethodNotFound,

    #[error("Invalid method parameters")]
    InvalidParams,

    #[error("Internal JSON-RPC error")]
    InternalError,

    #[error("Expected object in JSON-RPC request")]
    ExpectedObject,

    #[error("Expected string version in JSON-RPC request")]
    ExpectedStringVersion,

    #[error("Unknown version in JSON-RPC request")]
    UnknownVersion,

    #[error("Invalid null id in JSON-RPC request")]
    InvalidNullId,

    #[error("Expected string or number id in JSON-RPC request")]
    ExpectedStringNumberId,

    #[error("Missing id in JSON-RPC request version 1")]
    ExpectedId,

    #[error("Missing method in JSON-RPC request")]
    MissingMethod,

    #[error("Expected string method in JSON-RPC request")]
    ExpectedStringMethod,

    #[error("Expected structured params in JSON-RPC request version 2")]
    ExpectedStructuredParams,

    #[error("Missing params in JSON-RPC request version 1")]
    MissingParams,

    #[error("Expected array params in JSON-RPC request version 1")]
    ExpectedArrayParams,
}

impl RpcError {
    /// The numeric code sent on the wire.
    pub fn code(&self) -> i32 {
        match self {
            RpcError::ParseError => -32700,
            RpcError::MethodNotFound => -32601,
            RpcError::InvalidParams => -32602,
            RpcError::InternalError => -32603,
            // every shape violation is an invalid request
            _ => -32600,
        }
    }

    /// Build the error response value in `sp`.
    ///
    /// The `id` of the failed request is echoed when known, null otherwise.
    pub fn to_value(&self, id: Option<&Value>, sp: StoragePtr) -> Result<Value> {
        let mut jv = Value::with_storage(sp.clone());
        let obj = jv.emplace_object();
        obj.insert("jsonrpc", "2.0")?;
        let (_, err) = obj.insert("error", Value::with_storage(sp.clone()))?;
        let err = err.emplace_object();
        err.insert("code", i64::from(self.code()))?;
        err.insert("message", self.to_string().as_str())?;
        match id {
            Some(id) => obj.insert("id", id.clone_in(sp)?)?,
            None => obj.insert("id", Value::with_storage(sp))?,
        };
        Ok(jv)
    }
}

impl From<crate::error::ParseError> for RpcError {
    fn from(_: crate::error::ParseError) -> Self {
        RpcError::ParseError
    }
}

/// A validated JSON-RPC request.
#[derive(Debug)]
pub struct RpcRequest {
    /// Protocol version, 1 or 2.
    pub version: u8,

    /// The method name.
    pub method: Str,

    /// Request parameters. Object or array when present; version 1
    /// requests always carry an array.
    pub params: Option<Value>,

    /// Request id. String or number when present; always present in
    /// version 1 requests.
    pub id: Option<Value>,
}

impl RpcRequest {
    /// Validate `jv` as a request and pull its fields out.
    ///
    /// The id is extracted before anything else is checked, matching the
    /// order responders need: a shape error after that point still refers
    /// to an identifiable request.
    pub fn extract(mut jv: Value) -> std::result::Result<RpcRequest, RpcError> {
        let Some(obj) = jv.as_object_mut() else {
            return Err(RpcError::ExpectedObject);
        };
        let id = obj.remove("id");

        let version = match obj.remove("jsonrpc") {
            Some(v) => {
                let Some(s) = v.as_str() else {
                    return Err(RpcError::ExpectedStringVersion);
                };
                if s != "2.0" {
                    debug!(version = s, "unrecognized jsonrpc version");
                    return Err(RpcError::UnknownVersion);
                }
                2
            }
            None => 1,
        };

        if version == 2 {
            if let Some(id) = &id {
                if id.is_null() {
                    return Err(RpcError::InvalidNullId);
                }
                if !id.is_number() && !id.is_string() {
                    return Err(RpcError::ExpectedStringNumberId);
                }
            }
        } else if id.is_none() {
            return Err(RpcError::ExpectedId);
        }

        let method = match obj.remove("method") {
            None => return Err(RpcError::MissingMethod),
            Some(v) => match v.into_string() {
                Some(s) => s,
                None => return Err(RpcError::ExpectedStringMethod),
            },
        };

        let params = match (version, obj.remove("params")) {
            (2, None) => None,
            (2, Some(p)) => {
                if !p.is_object() && !p.is_array() {
                    return Err(RpcError::ExpectedStructuredParams);
                }
                Some(p)
            }
            (_, None) => return Err(RpcError::MissingParams),
            (_, Some(p)) => {
                if !p.is_array() {
                    return Err(RpcError::ExpectedArrayParams);
                }
                Some(p)
            }
        };

        Ok(RpcRequest {
            version,
            method,
            params,
            id,
        })
    }
}

/// Build the success response for a request with `id` in `sp`.
pub fn result_value(id: &Value, result: Value, sp: StoragePtr) -> Result<Value> {
    let mut jv = Value::with_storage(sp.clone());
    let obj = jv.emplace_object();
    obj.insert("jsonrpc", "2.0")?;
    obj.insert("id", id.clone_in(sp.clone())?)?;
    obj.insert("result", result.into_storage(sp)?)?;
    Ok(jv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::storage::default_storage;

    fn extract(text: &str) -> std::result::Result<RpcRequest, RpcError> {
        RpcRequest::extract(parse_str(text).unwrap())
    }

    #[test]
    fn test_version_2_request_without_params() {
        let req = extract(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).unwrap();
        assert_eq!(req.version, 2);
        assert_eq!(req.method, "ping");
        assert!(req.params.is_none());
        assert_eq!(req.id.unwrap().as_i64(), Some(1));
    }

    #[test]
    fn test_version_1_requires_id() {
        assert_eq!(
            extract(r#"{"method":"ping"}"#).unwrap_err(),
            RpcError::ExpectedId
        );
    }

    #[test]
    fn test_version_1_params_must_be_array() {
        let req = extract(r#"{"method":"do","id":5,"params":[1,2]}"#).unwrap();
        assert_eq!(req.version, 1);
        assert_eq!(req.params.unwrap().as_array().unwrap().len(), 2);

        assert_eq!(
            extract(r#"{"method":"do","id":5}"#).unwrap_err(),
            RpcError::MissingParams
        );
        assert_eq!(
            extract(r#"{"method":"do","id":5,"params":{"k":1}}"#).unwrap_err(),
            RpcError::ExpectedArrayParams
        );
    }

    #[test]
    fn test_version_2_shape_rules() {
        let cases = [
            ("[1,2]", RpcError::ExpectedObject),
            (
                r#"{"jsonrpc":2.0,"method":"m","id":1}"#,
                RpcError::ExpectedStringVersion,
            ),
            (
                r#"{"jsonrpc":"1.5","method":"m","id":1}"#,
                RpcError::UnknownVersion,
            ),
            (
                r#"{"jsonrpc":"2.0","method":"m","id":null}"#,
                RpcError::InvalidNullId,
            ),
            (
                r#"{"jsonrpc":"2.0","method":"m","id":[1]}"#,
                RpcError::ExpectedStringNumberId,
            ),
            (r#"{"jsonrpc":"2.0","id":1}"#, RpcError::MissingMethod),
            (
                r#"{"jsonrpc":"2.0","method":7,"id":1}"#,
                RpcError::ExpectedStringMethod,
            ),
            (
                r#"{"jsonrpc":"2.0","method":"m","id":1,"params":"x"}"#,
                RpcError::ExpectedStructuredParams,
            ),
        ];
        for (text, want) in cases {
            assert_eq!(extract(text).unwrap_err(), want, "{text}");
        }
    }

    #[test]
    fn test_version_2_id_is_optional() {
        let req = extract(r#"{"jsonrpc":"2.0","method":"notify"}"#).unwrap();
        assert_eq!(req.version, 2);
        assert!(req.id.is_none());
    }

    #[test]
    fn test_structured_params_pass_through() {
        let req =
            extract(r#"{"jsonrpc":"2.0","method":"m","id":"a","params":{"room":"general"}}"#)
                .unwrap();
        let params = req.params.unwrap();
        assert_eq!(
            params.as_object().unwrap().get("room").unwrap().as_str(),
            Some("general")
        );
        assert_eq!(req.id.unwrap().as_str(), Some("a"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RpcError::ParseError.code(), -32700);
        assert_eq!(RpcError::InvalidRequest.code(), -32600);
        assert_eq!(RpcError::MethodNotFound.code(), -32601);
        assert_eq!(RpcError::InvalidParams.code(), -32602);
        assert_eq!(RpcError::InternalError.code(), -32603);
        assert_eq!(RpcError::ExpectedId.code(), -32600);
        assert_eq!(RpcError::UnknownVersion.code(), -32600);
    }

    #[test]
    fn test_error_value_shape() {
        let id = Value::from(9i64);
        let jv = RpcError::MethodNotFound
            .to_value(Some(&id), default_storage())
            .unwrap();
        let o = jv.as_object().unwrap();
        assert_eq!(o.get("jsonrpc").unwrap().as_str(), Some("2.0"));
        assert_eq!(o.get("id").unwrap().as_i64(), Some(9));
        let err = o.get("error").unwrap().as_object().unwrap();
        assert_eq!(err.get("code").unwrap().as_i64(), Some(-32601));
        assert_eq!(
            err.get("message").unwrap().as_str(),
            Some("The method does not exist or is not available")
        );

        let jv = RpcError::ParseError.to_value(None, default_storage()).unwrap();
        assert!(jv.as_object().unwrap().get("id").unwrap().is_null());
    }

    #[test]
    fn test_result_value_shape() {
        let id = Value::from("req-1");
        let jv = result_value(&id, Value::from(42i64), default_storage()).unwrap();
        let o = jv.as_object().unwrap();
        assert_eq!(o.get("jsonrpc").unwrap().as_str(), Some("2.0"));
        assert_eq!(o.get("id").unwrap().as_str(), Some("req-1"));
        assert_eq!(o.get("result").unwrap().as_i64(), Some(42));
    }
}
