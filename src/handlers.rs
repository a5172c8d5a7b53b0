// src/handlers.rs
use crate::{AppState, errors::StarcrazeError, models::*};
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use log::info;
use serde::Deserialize;
use uuid::Uuid;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/options", web::get().to(list_options))
            .route("/sessions", web::post().to(create_session))
            .route("/sessions/{id}", web::get().to(get_session))
            .route("/sessions/{id}", web::delete().to(delete_session))
            .route("/sessions/{id}/view", web::put().to(switch_view))
            .route("/sessions/{id}/errors/{family}", web::delete().to(dismiss_error))
            .route("/sessions/{id}/prompt/subject", web::put().to(set_subject))
            .route("/sessions/{id}/prompt/image", web::post().to(upload_prompt_image))
            .route("/sessions/{id}/prompt/image", web::delete().to(clear_prompt_image))
            .route("/sessions/{id}/prompt/options", web::put().to(update_prompt_options))
            .route("/sessions/{id}/prompt/generate", web::post().to(generate_prompt))
            .route("/sessions/{id}/prompt/restyle", web::post().to(restyle_prompt))
            .route("/sessions/{id}/story/image", web::post().to(upload_story_image))
            .route("/sessions/{id}/story/options", web::put().to(update_story_options))
            .route("/sessions/{id}/story/generate", web::post().to(generate_story))
            .route("/sessions/{id}/studio/image", web::post().to(upload_studio_image))
            .route("/sessions/{id}/studio/image", web::delete().to(clear_studio_image))
            .route("/sessions/{id}/studio/options", web::put().to(update_studio_options))
            .route("/sessions/{id}/studio/generate", web::post().to(generate_images))
            .route("/sessions/{id}/studio/random-prompt", web::post().to(random_prompt))
            .route("/sessions/{id}/studio/negative-prompt", web::post().to(suggest_negative))
            .route("/sessions/{id}/studio/images/{index}", web::get().to(download_image)),
    )
    .route("/health", web::get().to(health_check));
}

#[derive(Debug, Deserialize)]
pub struct ViewUpdate {
    pub view: View,
}

#[derive(Debug, Deserialize)]
pub struct SubjectUpdate {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct PromptOptionsUpdate {
    pub model: Option<AiModel>,
    pub length: Option<PromptLength>,
    pub aspect_ratio: Option<AspectRatio>,
    pub mode: Option<PromptMode>,
    pub negative: Option<NegativeConstraint>,
}

#[derive(Debug, Deserialize)]
pub struct RestyleBody {
    pub style: PromptStyle,
}

#[derive(Debug, Deserialize)]
pub struct StoryOptionsUpdate {
    pub description: Option<String>,
    pub frame_count: Option<u8>,
    pub model: Option<AiModel>,
}

#[derive(Debug, Deserialize)]
pub struct StudioOptionsUpdate {
    pub prompt: Option<String>,
    pub style: Option<ImageStyle>,
    pub aspect_ratio: Option<AspectRatio>,
    pub detail_level: Option<DetailLevel>,
    pub quantity: Option<u8>,
    pub mode: Option<PromptMode>,
    pub negative: Option<NegativeConstraint>,
}

#[derive(Debug, Deserialize)]
pub struct StudioGenerateBody {
    pub detail_override: Option<DetailLevel>,
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "starcraze",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn list_options() -> HttpResponse {
    HttpResponse::Ok().json(OptionCatalog::new())
}

pub async fn create_session(data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let session = data.controller.create_session().await;
    Ok(HttpResponse::Created().json(&session))
}

pub async fn get_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.controller.snapshot(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn delete_session(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    data.controller.sessions().remove(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn switch_view(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<ViewUpdate>,
) -> Result<HttpResponse, Error> {
    let view = body.into_inner().view;
    let session = data
        .controller
        .update(&path.into_inner(), |s| {
            s.switch_view(view);
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn dismiss_error(
    path: web::Path<(Uuid, OperationKind)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (id, family) = path.into_inner();
    let session = data
        .controller
        .update(&id, |s| {
            s.dismiss_error(family);
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn set_subject(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<SubjectUpdate>,
) -> Result<HttpResponse, Error> {
    let text = body.into_inner().text;
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Prompt, |s| {
            s.prompt.set_text(text);
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

/// Reads the first file field of a multipart upload.
async fn read_upload(mut payload: Multipart) -> Result<(String, Bytes), Error> {
    if let Some(mut field) = payload.try_next().await? {
        let filename = field
            .content_disposition()
            .get_filename()
            .ok_or_else(|| StarcrazeError::Validation("No filename provided".to_string()))?
            .to_string();

        let mut data = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        return Ok((filename, data.freeze()));
    }

    Err(StarcrazeError::Validation("No file uploaded".to_string()).into())
}

async fn encode_upload(payload: Multipart, data: &AppState) -> Result<MediaAttachment, Error> {
    let (filename, bytes) = read_upload(payload).await?;
    let attachment = data.media_encoder.encode(&filename, bytes)?;
    info!(
        "Encoded {} ({}, {} bytes)",
        attachment.file_name,
        attachment.media_type.mime(),
        attachment.size
    );
    Ok(attachment)
}

pub async fn upload_prompt_image(
    path: web::Path<Uuid>,
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let attachment = encode_upload(payload, &data).await?;
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Prompt, |s| {
            s.prompt.attach(attachment);
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn clear_prompt_image(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Prompt, |s| {
            s.prompt.clear_attachment();
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn update_prompt_options(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<PromptOptionsUpdate>,
) -> Result<HttpResponse, Error> {
    let update = body.into_inner();
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Prompt, |s| {
            let view = &mut s.prompt;
            if let Some(model) = update.model {
                view.model = model;
            }
            if let Some(length) = update.length {
                view.length = length;
            }
            if let Some(aspect_ratio) = update.aspect_ratio {
                view.aspect_ratio = aspect_ratio;
            }
            if let Some(mode) = update.mode {
                view.mode = mode;
            }
            if let Some(negative) = update.negative {
                view.negative = negative;
            }
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn generate_prompt(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.controller.generate_prompt(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn restyle_prompt(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<RestyleBody>,
) -> Result<HttpResponse, Error> {
    let session = data
        .controller
        .restyle_prompt(&path.into_inner(), body.style)
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn upload_story_image(
    path: web::Path<Uuid>,
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let attachment = encode_upload(payload, &data).await?;
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Story, |s| {
            s.story.attach(attachment);
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn update_story_options(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<StoryOptionsUpdate>,
) -> Result<HttpResponse, Error> {
    let update = body.into_inner();
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Story, |s| {
            if let Some(frame_count) = update.frame_count {
                s.story.set_frame_count(frame_count)?;
            }
            if let Some(description) = update.description {
                s.story.description = description;
            }
            if let Some(model) = update.model {
                s.story.model = model;
            }
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn generate_story(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.controller.generate_story(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn upload_studio_image(
    path: web::Path<Uuid>,
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let attachment = encode_upload(payload, &data).await?;
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Studio, |s| {
            s.studio.attachment = Some(attachment);
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn clear_studio_image(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Studio, |s| {
            s.studio.attachment = None;
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn update_studio_options(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<StudioOptionsUpdate>,
) -> Result<HttpResponse, Error> {
    let update = body.into_inner();
    let session = data
        .controller
        .edit_view(&path.into_inner(), View::Studio, |s| {
            let view = &mut s.studio;
            if let Some(quantity) = update.quantity {
                view.set_quantity(quantity)?;
            }
            if let Some(prompt) = update.prompt {
                view.prompt = prompt;
            }
            if let Some(style) = update.style {
                view.style = style;
            }
            if let Some(aspect_ratio) = update.aspect_ratio {
                view.aspect_ratio = aspect_ratio;
            }
            if let Some(detail_level) = update.detail_level {
                view.detail_level = detail_level;
            }
            if let Some(mode) = update.mode {
                view.mode = mode;
            }
            if let Some(negative) = update.negative {
                view.negative = negative;
            }
            Ok(())
        })
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn generate_images(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, Error> {
    // The body is optional; an empty one means no override.
    let detail_override = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<StudioGenerateBody>(&body)
            .map_err(|e| StarcrazeError::Validation(format!("Invalid request body: {}", e)))?
            .detail_override
    };
    let session = data
        .controller
        .generate_images(&path.into_inner(), detail_override)
        .await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn random_prompt(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.controller.random_prompt(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn suggest_negative(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = data.controller.suggest_negative(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(&session))
}

pub async fn download_image(
    path: web::Path<(Uuid, usize)>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (id, index) = path.into_inner();
    let session = data.controller.snapshot(&id).await?;

    let image = session
        .studio
        .images
        .get(index)
        .ok_or_else(|| StarcrazeError::NotFound(format!("image {}", index)))?;

    Ok(HttpResponse::Ok()
        .content_type(image.mime_type.as_str())
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", image.download_name()),
        ))
        .body(image.data.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::services::orchestrator::tests::FakeApi;
    use crate::services::{MediaEncoder, Orchestrator, SessionStore};
    use crate::session::Session;
    use actix_web::{App, http::StatusCode, test};
    use std::sync::Arc;

    fn state(api: FakeApi) -> AppState {
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(api)));
        AppState {
            controller: Arc::new(Controller::new(orchestrator, Arc::new(SessionStore::new()))),
            media_encoder: Arc::new(MediaEncoder::new()),
        }
    }

    #[actix_web::test]
    async fn options_list_every_closed_set() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(FakeApi::default())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/options").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["prompt_styles"].as_array().unwrap().len(), 21);
        assert_eq!(body["image_styles"].as_array().unwrap().len(), 23);
        assert_eq!(body["aspect_ratios"][0], "16:9");
    }

    #[actix_web::test]
    async fn generate_round_trip_over_http() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(
                    FakeApi::default().with_text("a red fox, snowfall --ar 16:9"),
                )))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/v1/sessions").to_request();
        let created: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/prompt/subject", id))
            .set_json(serde_json::json!({ "text": "a red fox in snow" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/prompt/generate", id))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["prompt"]["generated_prompt"], "a red fox, snowfall --ar 16:9");
        assert_eq!(body["operations"]["enhance_prompt"]["pending"], false);
    }

    #[actix_web::test]
    async fn out_of_range_quantity_is_a_bad_request() {
        let data = state(FakeApi::default());
        let id = data.controller.create_session().await.id;
        let app = test::init_service(App::new().app_data(web::Data::new(data)).configure(configure)).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/studio/options", id))
            .set_json(serde_json::json!({ "quantity": 4 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn non_image_upload_is_rejected() {
        let data = state(FakeApi::default());
        let id = data.controller.create_session().await.id;
        let app = test::init_service(App::new().app_data(web::Data::new(data)).configure(configure)).await;

        let boundary = "starcrazeboundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n--{b}--\r\n",
            b = boundary
        );
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/prompt/image", id))
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn download_serves_generated_images() {
        let data = state(FakeApi::default().with_text("master").with_images(2));
        let id = data.controller.create_session().await.id;
        data.controller
            .update(&id, |s: &mut Session| s.studio.set_quantity(2))
            .await
            .unwrap();
        data.controller.generate_images(&id, None).await.unwrap();
        let app = test::init_service(App::new().app_data(web::Data::new(data)).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/studio/images/1", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("starcraze-studio-"));
        let bytes = test::read_body(resp).await;
        assert_eq!(bytes.as_ref(), &[1u8; 4]);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}/studio/images/5", id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn edits_are_refused_while_the_view_is_busy() {
        let data = state(FakeApi::default());
        let id = data.controller.create_session().await.id;
        data.controller
            .update(&id, |s: &mut Session| s.begin(OperationKind::EnhancePrompt).map(|_| ()))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(web::Data::new(data)).configure(configure)).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/prompt/subject", id))
            .set_json(serde_json::json!({ "text": "a new idea" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/prompt/restyle", id))
            .set_json(serde_json::json!({ "style": "Anime" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/studio/options", id))
            .set_json(serde_json::json!({ "quantity": 2 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn studio_generate_body_is_optional_but_must_be_valid() {
        let data = state(FakeApi::default().with_text("master").with_images(1));
        let id = data.controller.create_session().await.id;
        let app = test::init_service(App::new().app_data(web::Data::new(data)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/studio/generate", id))
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"detail_override\": \"extreme\"}")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/sessions/{}/studio/generate", id))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["studio"]["images"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn unknown_session_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(FakeApi::default())))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
