//! Request and response bodies shared by the transports.

use ferry_network::{GraphQlResponse, RequestParameters, TransportError, UploadableMap, Variables};
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value, json};

/// The `{ id | query, operationName, variables }` object sent for an
/// operation.
pub fn operation_body(params: &RequestParameters, variables: &Variables) -> Value {
    let mut body = Map::new();
    match &params.id {
        Some(id) => body.insert("id".to_string(), Value::String(id.clone())),
        None => body.insert(
            "query".to_string(),
            params.text.clone().map_or(Value::Null, Value::String),
        ),
    };
    body.insert(
        "operationName".to_string(),
        Value::String(params.name.clone()),
    );
    body.insert("variables".to_string(), Value::Object(variables.clone()));
    Value::Object(body)
}

/// Builds a multipart request following the GraphQL multipart request
/// convention.
///
/// Each file replaces its variable with `null` in `operations`; `map` binds
/// the numbered file parts to `variables.<name>`. Files are numbered in name
/// order.
pub fn multipart_form(
    params: &RequestParameters,
    variables: &Variables,
    uploadables: &UploadableMap,
) -> Result<Form, TransportError> {
    let mut names: Vec<&String> = uploadables.keys().collect();
    names.sort();

    let mut variables = variables.clone();
    let mut map = Map::new();
    for (index, name) in names.iter().enumerate() {
        variables.insert((*name).clone(), Value::Null);
        map.insert(index.to_string(), json!([format!("variables.{name}")]));
    }
    let operations = operation_body(params, &variables);

    let mut form = Form::new()
        .text("operations", operations.to_string())
        .text("map", Value::Object(map).to_string());

    for (index, name) in names.into_iter().enumerate() {
        let Some(upload) = uploadables.get(name) else {
            continue;
        };
        let mut part = Part::bytes(upload.data.to_vec()).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|err| TransportError::Request(err.to_string()))?;
        }
        form = form.part(index.to_string(), part);
    }

    Ok(form)
}

/// Decodes a response body holding one payload or an array of payloads.
pub fn decode_payloads(body: &[u8]) -> Result<Vec<GraphQlResponse>, TransportError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(TransportError::from))
            .collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}
