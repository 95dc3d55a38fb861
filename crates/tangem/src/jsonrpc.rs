//! JSON-RPC 2.0 front end over a [`CardSession`].
//!
//! [`JsonRpcLinker::handle`] accepts a request or a batch of requests as text,
//! builds the matching runnable from the `params` object and runs it on the
//! session. Byte fields travel as hex strings in both directions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::card::EllipticCurve;
use crate::commands::{
    AttestCardKeyCommand, CardSessionRunnable, ChangeFileSettingsTask, CreateWalletTask, DeleteFilesTask,
    DepersonalizeCommand, FileToWrite, FileVisibility, PersonalizeCommand, PreflightReadMode, PreflightReadTask,
    PurgeWalletCommand, ReadFilesTask, SetUserCodeCommand, SignCommand, SignHashCommand, WriteFilesTask,
};
use crate::error::TangemSdkError;
use crate::hdwallet::DerivationPath;
use crate::personalization::{Acquirer, CardConfig, Issuer, Manufacturer};
use crate::session::CardSession;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorType {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError,
    UnknownError,
}

impl JsonRpcErrorType {
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::UnknownError => -32999,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid parameters",
            Self::InternalError => "Internal error",
            Self::ServerError => "Server error",
            Self::UnknownError => "Unknown error",
        }
    }

    /// Error of this type with a free-form detail in `data`
    pub fn with_details(self, details: impl Into<String>) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.message().to_owned(),
            data: Some(ErrorData {
                code: i64::from(self.code()),
                message: details.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({}: {})", data.code, data.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}

impl From<JsonRpcErrorType> for JsonRpcError {
    fn from(error_type: JsonRpcErrorType) -> Self {
        Self {
            code: error_type.code(),
            message: error_type.message().to_owned(),
            data: None,
        }
    }
}

/// Card failures keep their own code and variant name in `data`
impl From<TangemSdkError> for JsonRpcError {
    fn from(error: TangemSdkError) -> Self {
        Self {
            data: Some(ErrorData {
                code: i64::from(error.code()),
                message: error.name(),
            }),
            ..JsonRpcErrorType::ServerError.into()
        }
    }
}

fn missing_field(name: &str) -> JsonRpcError {
    JsonRpcErrorType::InvalidRequest
        .with_details(format!("The field is missing or an unsupported value is used: {name}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub method: String,
    pub params: Map<String, Value>,
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Validate one request object
    pub fn from_value(value: Value) -> Result<Self, JsonRpcError> {
        let Value::Object(mut object) = value else {
            return Err(JsonRpcErrorType::InvalidRequest.into());
        };
        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => return Err(missing_field("jsonrpc")),
        }
        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(missing_field("method")),
        };
        let params = match object.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => return Err(missing_field("params")),
        };
        let id = object.remove("id").filter(|id| !id.is_null());
        Ok(Self { method, params, id })
    }

    /// Request as a JSON object, ready to send
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("jsonrpc".into(), JSONRPC_VERSION.into());
        object.insert("method".into(), self.method.clone().into());
        object.insert("params".into(), Value::Object(self.params.clone()));
        if let Some(id) = &self.id {
            object.insert("id".into(), id.clone());
        }
        Value::Object(object)
    }

    fn params<T: DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        serde_json::from_value(Value::Object(self.params.clone()))
            .map_err(|e| JsonRpcErrorType::InvalidParams.with_details(e.to_string()))
    }
}

impl FromStr for JsonRpcRequest {
    type Err = JsonRpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| JsonRpcErrorType::ParseError.with_details(e.to_string()))?;
        Self::from_value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(result: Value, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(error: JsonRpcError, id: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// Methods the linker can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Scan,
    PreflightRead,
    CreateWallet,
    PurgeWallet,
    SignHash,
    SignHashes,
    SetAccessCode,
    SetPasscode,
    ResetUserCodes,
    WriteFiles,
    ReadFiles,
    DeleteFiles,
    ChangeFileSettings,
    AttestCardKey,
    Personalize,
    Depersonalize,
}

impl Method {
    pub const ALL: [Self; 16] = [
        Self::Scan,
        Self::PreflightRead,
        Self::CreateWallet,
        Self::PurgeWallet,
        Self::SignHash,
        Self::SignHashes,
        Self::SetAccessCode,
        Self::SetPasscode,
        Self::ResetUserCodes,
        Self::WriteFiles,
        Self::ReadFiles,
        Self::DeleteFiles,
        Self::ChangeFileSettings,
        Self::AttestCardKey,
        Self::Personalize,
        Self::Depersonalize,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Scan => "SCAN",
            Self::PreflightRead => "PREFLIGHT_READ",
            Self::CreateWallet => "CREATE_WALLET",
            Self::PurgeWallet => "PURGE_WALLET",
            Self::SignHash => "SIGN_HASH",
            Self::SignHashes => "SIGN_HASHES",
            Self::SetAccessCode => "SET_ACCESSCODE",
            Self::SetPasscode => "SET_PASSCODE",
            Self::ResetUserCodes => "RESET_USERCODES",
            Self::WriteFiles => "WRITE_FILES",
            Self::ReadFiles => "READ_FILES",
            Self::DeleteFiles => "DELETE_FILES",
            Self::ChangeFileSettings => "CHANGE_FILE_SETTINGS",
            Self::AttestCardKey => "ATTEST_CARD_KEY",
            Self::Personalize => "PERSONALIZE",
            Self::Depersonalize => "DEPERSONALIZE",
        }
    }
}

impl FromStr for Method {
    type Err = JsonRpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| JsonRpcErrorType::MethodNotFound.with_details(s))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreflightReadParams {
    read_mode: PreflightReadMode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWalletParams {
    curve: EllipticCurve,
    #[serde(default)]
    is_permanent: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletParams {
    #[serde(with = "crate::hex_serde")]
    wallet_public_key: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignHashParams {
    #[serde(with = "crate::hex_serde")]
    hash: Vec<u8>,
    #[serde(with = "crate::hex_serde")]
    wallet_public_key: Vec<u8>,
    #[serde(default)]
    derivation_path: Option<DerivationPath>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignHashesParams {
    #[serde(with = "crate::hex_serde::list")]
    hashes: Vec<Vec<u8>>,
    #[serde(with = "crate::hex_serde")]
    wallet_public_key: Vec<u8>,
    #[serde(default)]
    derivation_path: Option<DerivationPath>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessCodeParams {
    #[serde(default)]
    access_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasscodeParams {
    #[serde(default)]
    passcode: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteFilesParams {
    files: Vec<FileToWrite>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadFilesParams {
    #[serde(default)]
    read_private_files: bool,
    #[serde(default)]
    indices: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilesParams {
    #[serde(default)]
    indices: Option<Vec<u8>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeFileSettingsParams {
    changes: BTreeMap<u8, FileVisibility>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestCardKeyParams {
    #[serde(default, with = "crate::hex_serde::option")]
    challenge: Option<Vec<u8>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonalizeParams {
    config: CardConfig,
    #[serde(default)]
    issuer: Option<Issuer>,
    #[serde(default)]
    manufacturer: Option<Manufacturer>,
    #[serde(default)]
    acquirer: Option<Acquirer>,
}

/// Runs JSON-RPC requests on a card session
pub struct JsonRpcLinker<'a> {
    session: &'a mut CardSession,
}

impl<'a> JsonRpcLinker<'a> {
    pub fn new(session: &'a mut CardSession) -> Self {
        Self { session }
    }

    /// Handle a request or a batch and render the response.
    ///
    /// A batch produces an array with one response per request, in order.
    pub fn handle(&mut self, input: &str) -> String {
        let response = match serde_json::from_str::<Value>(input) {
            Ok(Value::Array(requests)) if !requests.is_empty() => {
                let responses: Vec<_> = requests
                    .into_iter()
                    .map(|request| self.handle_value(request))
                    .collect();
                serde_json::to_value(responses)
            }
            Ok(Value::Array(_)) => {
                serde_json::to_value(JsonRpcResponse::failure(JsonRpcErrorType::InvalidRequest.into(), None))
            }
            Ok(request) => serde_json::to_value(self.handle_value(request)),
            Err(e) => serde_json::to_value(JsonRpcResponse::failure(
                JsonRpcErrorType::ParseError.with_details(e.to_string()),
                None,
            )),
        };
        match response {
            Ok(response) => response.to_string(),
            Err(e) => {
                warn!("Failed to render JSON-RPC response: {e}");
                let fallback = JsonRpcResponse::failure(
                    JsonRpcErrorType::InternalError.with_details(e.to_string()),
                    None,
                );
                serde_json::to_string(&fallback).unwrap_or_default()
            }
        }
    }

    fn handle_value(&mut self, value: Value) -> JsonRpcResponse {
        let fallback_id = value.get("id").filter(|id| !id.is_null()).cloned();
        let request = match JsonRpcRequest::from_value(value) {
            Ok(request) => request,
            Err(error) => return JsonRpcResponse::failure(error, fallback_id),
        };
        let id = request.id.clone();
        match self.execute(&request) {
            Ok(result) => JsonRpcResponse::success(result, id),
            Err(error) => JsonRpcResponse::failure(error, id),
        }
    }

    /// Run one parsed request and return its `result`
    pub fn execute(&mut self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let method: Method = request.method.parse()?;
        debug!(%method, "JSON-RPC request");

        match method {
            Method::Scan => self.run(&mut PreflightReadTask::new(
                PreflightReadMode::FullCardRead,
                self.session.environment.config.card_id.clone(),
            )),
            Method::PreflightRead => {
                let params: PreflightReadParams = request.params()?;
                let card_id = self.session.environment.config.card_id.clone();
                self.run(&mut PreflightReadTask::new(params.read_mode, card_id))
            }
            Method::CreateWallet => {
                let params: CreateWalletParams = request.params()?;
                self.run(&mut CreateWalletTask::new(params.curve, params.is_permanent))
            }
            Method::PurgeWallet => {
                let params: WalletParams = request.params()?;
                self.run(&mut PurgeWalletCommand::new(params.wallet_public_key))
            }
            Method::SignHash => {
                let params: SignHashParams = request.params()?;
                let mut command = SignHashCommand::new(params.hash, params.wallet_public_key);
                if let Some(path) = params.derivation_path {
                    command = command.with_derivation_path(path);
                }
                self.run(&mut command)
            }
            Method::SignHashes => {
                let params: SignHashesParams = request.params()?;
                let mut command = SignCommand::new(&params.hashes, params.wallet_public_key);
                if let Some(path) = params.derivation_path {
                    command = command.with_derivation_path(path);
                }
                self.run(&mut command)
            }
            Method::SetAccessCode => {
                let params: AccessCodeParams = request.params()?;
                self.run(&mut SetUserCodeCommand::change_access_code(params.access_code.as_deref()))
            }
            Method::SetPasscode => {
                let params: PasscodeParams = request.params()?;
                self.run(&mut SetUserCodeCommand::change_passcode(params.passcode.as_deref()))
            }
            Method::ResetUserCodes => self.run(&mut SetUserCodeCommand::reset_user_codes()),
            Method::WriteFiles => {
                let params: WriteFilesParams = request.params()?;
                self.run(&mut WriteFilesTask::new(params.files))
            }
            Method::ReadFiles => {
                let params: ReadFilesParams = request.params()?;
                self.run(&mut ReadFilesTask::new(params.read_private_files).with_indices(params.indices))
            }
            Method::DeleteFiles => {
                let params: DeleteFilesParams = request.params()?;
                self.run(&mut DeleteFilesTask::new(params.indices))
            }
            Method::ChangeFileSettings => {
                let params: ChangeFileSettingsParams = request.params()?;
                self.run(&mut ChangeFileSettingsTask::new(params.changes))
            }
            Method::AttestCardKey => {
                let params: AttestCardKeyParams = request.params()?;
                self.run(&mut AttestCardKeyCommand::new(params.challenge))
            }
            Method::Personalize => {
                let params: PersonalizeParams = request.params()?;
                let mut command = PersonalizeCommand::new(
                    params.config,
                    params.issuer.unwrap_or_else(Issuer::development),
                    params.manufacturer.unwrap_or_else(Manufacturer::development),
                );
                if let Some(acquirer) = params.acquirer {
                    command = command.with_acquirer(acquirer);
                }
                self.run(&mut command)
            }
            Method::Depersonalize => self.run(&mut DepersonalizeCommand::new()),
        }
    }

    fn run<R>(&mut self, runnable: &mut R) -> Result<Value, JsonRpcError>
    where
        R: CardSessionRunnable,
        R::Response: Serialize,
    {
        let response = self.session.start(runnable)?;
        serde_json::to_value(response).map_err(|e| JsonRpcErrorType::InternalError.with_details(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::card::{CardStatus, EllipticCurve, ManufactureDate, SettingsMask};
    use crate::config::Config;
    use crate::delegate::SilentDelegate;
    use crate::reader::MockReader;
    use crate::tlv::{TlvBuilder, TlvTag};

    fn session(reader: &MockReader) -> CardSession {
        CardSession::new(Box::new(reader.clone()), Box::new(SilentDelegate), Config::default())
    }

    fn legacy_read_response() -> Vec<u8> {
        let mut card_data = TlvBuilder::new();
        card_data.append(TlvTag::BatchId, "FFFF").unwrap();
        card_data
            .append(TlvTag::ManufactureDateTime, &ManufactureDate::new(2020, 11, 2).unwrap())
            .unwrap();
        card_data.append(TlvTag::IssuerName, "TANGEM SDK").unwrap();

        let mut builder = TlvBuilder::new();
        builder.append(TlvTag::CardId, "CB79000000000001").unwrap();
        builder.append(TlvTag::ManufacturerName, "TANGEM").unwrap();
        builder.append(TlvTag::Status, &CardStatus::Loaded).unwrap();
        builder.append(TlvTag::Firmware, "2.30r").unwrap();
        builder.append(TlvTag::CardPublicKey, &[0x04u8; 65]).unwrap();
        builder.append(TlvTag::SettingsMask, &SettingsMask::IS_REUSABLE).unwrap();
        builder.append(TlvTag::IssuerPublicKey, &[0x04u8; 65]).unwrap();
        builder.append(TlvTag::CurveId, &EllipticCurve::Secp256k1).unwrap();
        builder.append(TlvTag::PauseBeforePin2, &150u16).unwrap();
        builder.append_raw(TlvTag::CardData, card_data.serialize());
        builder.append(TlvTag::WalletPublicKey, &[0x02u8; 33]).unwrap();
        builder.serialize().to_vec()
    }

    fn handle(reader: &MockReader, input: &str) -> Value {
        let mut session = session(reader);
        let output = JsonRpcLinker::new(&mut session).handle(input);
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_error_codes() {
        let codes: Vec<_> = [
            JsonRpcErrorType::ParseError,
            JsonRpcErrorType::InvalidRequest,
            JsonRpcErrorType::MethodNotFound,
            JsonRpcErrorType::InvalidParams,
            JsonRpcErrorType::InternalError,
            JsonRpcErrorType::ServerError,
            JsonRpcErrorType::UnknownError,
        ]
        .into_iter()
        .map(JsonRpcErrorType::code)
        .collect();
        assert_eq!(codes, vec![-32700, -32600, -32601, -32602, -32603, -32000, -32999]);
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(
            "{not json".parse::<JsonRpcRequest>().unwrap_err().code,
            JsonRpcErrorType::ParseError.code()
        );
        let missing_method = r#"{"jsonrpc": "2.0", "id": 1}"#.parse::<JsonRpcRequest>().unwrap_err();
        assert_eq!(missing_method.code, -32600);
        assert!(missing_method.data.unwrap().message.ends_with("method"));
        let missing_version = r#"{"method": "SCAN", "id": 1}"#.parse::<JsonRpcRequest>().unwrap_err();
        assert!(missing_version.data.unwrap().message.ends_with("jsonrpc"));

        let request: JsonRpcRequest = r#"{"jsonrpc": "2.0", "method": "scan", "id": 7}"#.parse().unwrap();
        assert_eq!(request.method, "scan");
        assert!(request.params.is_empty());
        assert_eq!(request.id, Some(json!(7)));
        assert_eq!(request.method.parse::<Method>().unwrap(), Method::Scan);
    }

    #[test]
    fn test_tangem_error_mapping() {
        let error = JsonRpcError::from(TangemSdkError::WalletNotFound);
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "Server error");
        assert_eq!(
            error.data,
            Some(ErrorData {
                code: 30008,
                message: "WalletNotFound".into()
            })
        );
    }

    #[test]
    fn test_unknown_method_and_bad_params_skip_the_card() {
        let reader = MockReader::default();
        let response = handle(&reader, r#"{"jsonrpc": "2.0", "method": "FORMAT", "id": 1}"#);
        assert_eq!(response["error"]["code"], -32601);
        assert_eq!(response["id"], 1);

        let response = handle(
            &reader,
            r#"{"jsonrpc": "2.0", "method": "CREATE_WALLET", "params": {"curve": "rsa"}, "id": 2}"#,
        );
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(reader.sent_count(), 0);
    }

    #[test]
    fn test_scan() {
        let reader = MockReader::default();
        reader.push(&legacy_read_response(), 0x9000);
        let response = handle(&reader, r#"{"jsonrpc": "2.0", "method": "SCAN", "id": "a"}"#);
        assert_eq!(response["jsonrpc"], "2.0");
        assert_eq!(response["id"], "a");
        assert_eq!(response["result"]["cardId"], "CB79000000000001");
        assert!(response.get("error").is_none());
    }

    #[test]
    fn test_batch_keeps_order_and_ids() {
        let reader = MockReader::default();
        reader.push(&[], 0x9000);
        let response = handle(
            &reader,
            r#"[
                {"jsonrpc": "2.0", "method": "DEPERSONALIZE", "id": 1},
                {"method": "SCAN", "id": 2}
            ]"#,
        );
        let responses = response.as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["result"]["success"], true);
        assert_eq!(responses[1]["error"]["code"], -32600);
        assert_eq!(responses[1]["id"], 2);
    }

    #[test]
    fn test_card_failure_is_a_server_error() {
        let reader = MockReader::default();
        reader.push(&legacy_read_response(), 0x9000);
        let response = handle(
            &reader,
            r#"{"jsonrpc": "2.0", "method": "PURGE_WALLET",
                "params": {"walletPublicKey": "03AA"}, "id": 3}"#,
        );
        assert_eq!(response["error"]["code"], -32000);
        assert_eq!(response["error"]["data"]["code"], 30008);
        assert_eq!(response["error"]["data"]["message"], "WalletNotFound");
        assert_eq!(reader.sent_count(), 1);
    }

    #[test]
    fn test_file_methods_are_linked() {
        for name in ["READ_FILES", "DELETE_FILES", "CHANGE_FILE_SETTINGS", "ATTEST_CARD_KEY"] {
            assert_eq!(name.parse::<Method>().unwrap().name(), name);
        }

        // COS 2.30 has no files; the read stops after the preflight
        let reader = MockReader::default();
        reader.push(&legacy_read_response(), 0x9000);
        let response = handle(
            &reader,
            r#"{"jsonrpc": "2.0", "method": "READ_FILES", "params": {"readPrivateFiles": false}, "id": 4}"#,
        );
        assert_eq!(response["error"]["data"]["code"], 50008);
        assert_eq!(reader.sent_count(), 1);

        let response = handle(
            &reader,
            r#"{"jsonrpc": "2.0", "method": "CHANGE_FILE_SETTINGS",
                "params": {"changes": {"1": "loud"}}, "id": 5}"#,
        );
        assert_eq!(response["error"]["code"], -32602);
    }
}
