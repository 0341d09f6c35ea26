use axum::{
    Extension, Json,
    extract::{Multipart, State},
};
use autopatch_core::{PatchMode, RunReport};
use tracing::info;

use crate::{
    auth::CurrentUser,
    infra::{
        app_state::AppState,
        errors::{AppError, AppResult},
    },
};

const FILE_FIELD: &str = "file";
const MODE_FIELD: &str = "mode";

#[derive(Debug)]
struct Upload {
    file_name: String,
    source: String,
}

/// Accept a `.c` upload and run the whole workflow on it.
pub async fn create_run(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> AppResult<Json<RunReport>> {
    let (upload, mode) =
        read_upload(multipart, state.config().workspace.max_upload_bytes).await?;

    if !state.pipeline.supports(mode) {
        return Err(AppError::bad_request(
            "Remote-assisted patching is not configured on this server",
        ));
    }

    info!(
        username = %user.username,
        file = %upload.file_name,
        bytes = upload.source.len(),
        %mode,
        "starting run"
    );
    let report = state.pipeline.run(&upload.source, mode).await?;
    info!(run_id = %report.run_id, "run finished");

    Ok(Json(report))
}

async fn read_upload(
    mut multipart: Multipart,
    max_bytes: usize,
) -> AppResult<(Upload, PatchMode)> {
    let mut upload = None;
    let mut mode = PatchMode::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::bad_request("Uploaded file has no name"))?;
                if !file_name.ends_with(".c") {
                    return Err(AppError::bad_request("Only .c files are accepted"));
                }

                let bytes = field.bytes().await?;
                if bytes.is_empty() {
                    return Err(AppError::bad_request("Uploaded file is empty"));
                }
                if bytes.len() > max_bytes {
                    return Err(AppError::payload_too_large(format!(
                        "Uploaded file exceeds {max_bytes} bytes"
                    )));
                }
                let source = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::bad_request("Uploaded file is not valid UTF-8"))?;

                upload = Some(Upload { file_name, source });
            }
            Some(MODE_FIELD) => {
                let raw = field.text().await?;
                mode = raw.parse().map_err(AppError::bad_request)?;
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::bad_request("No file part in request"))?;
    Ok((upload, mode))
}
