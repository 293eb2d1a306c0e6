use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::errors::AppError;

/// JSON request body whose decoding failures use the API error shape:
/// a mistyped field is a validation error on that field, anything else
/// unparseable is a bad request.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;
        decode(&bytes).map(JsonBody)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let field = err.path().to_string();
        let inner = err.into_inner();
        if inner.is_data() && field != "." {
            AppError::validation(&field, format!("the {field} field is invalid: {inner}"))
        } else {
            AppError::bad_request(format!("malformed JSON body: {inner}"))
        }
    })?;
    deserializer
        .end()
        .map_err(|err| AppError::bad_request(format!("malformed JSON body: {err}")))?;
    Ok(value)
}
