use argh::FromArgs;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use invoice_extractor::{
    AnswerOrchestrator, AnswerResult, GeminiClient, GeminiConfig, ImageHandle, MultimodalModel,
    page::{self, PageView},
};
use std::sync::Arc;

mod messages;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const BUSY_MESSAGE: &str = "Still answering the previous question, try again shortly.";

type Shared<M> = State<Arc<AnswerOrchestrator<M>>>;

#[derive(FromArgs)]
/// Multilanguage Invoice Extractor: ask questions about an invoice image.
struct ExtractorArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

struct Submission {
    question: String,
    image: Option<ImageHandle>,
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, String> {
    let mut question = String::new();
    let mut uploaded = None;
    let mut retained = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(page::QUESTION_FIELD) => {
                question = field.text().await.map_err(|e| e.to_string())?;
            }
            Some(page::UPLOAD_FIELD) => {
                uploaded = Some(field.bytes().await.map_err(|e| e.to_string())?.to_vec());
            }
            Some(page::RETAINED_FIELD) => {
                retained = Some(field.text().await.map_err(|e| e.to_string())?);
            }
            _ => {}
        }
    }

    Ok(Submission {
        question,
        image: page::resolve_image(uploaded, retained.as_deref()),
    })
}

/// Runs the submission on a blocking thread. `None` when another answer is in flight.
async fn run_answer<M>(
    orchestrator: Arc<AnswerOrchestrator<M>>,
    submission: Submission,
) -> Result<(Submission, Option<AnswerResult>), tokio::task::JoinError>
where
    M: MultimodalModel + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let outcome = orchestrator.try_answer(&submission.question, submission.image.as_ref());
        (submission, outcome)
    })
    .await
}

async fn get_page() -> Html<String> {
    Html(page::render(&PageView::default()))
}

async fn post_page<M>(State(orchestrator): Shared<M>, multipart: Multipart) -> Response
where
    M: MultimodalModel + Send + 'static,
{
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    match run_answer(orchestrator, submission).await {
        Ok((submission, Some(outcome))) => Html(page::render(&PageView {
            question: &submission.question,
            image: submission.image.as_ref(),
            outcome: Some(&outcome),
        }))
        .into_response(),
        Ok((_, None)) => (StatusCode::CONFLICT, BUSY_MESSAGE).into_response(),
        Err(e) => {
            log::error!("Answer task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

fn answer_response(outcome: AnswerResult) -> messages::AnswerResponse {
    match outcome {
        Ok(text) => messages::AnswerResponse {
            status: "success".to_string(),
            response: Some(text),
            kind: None,
            message: None,
        },
        Err(e) => error_response(e.kind().as_str(), e.message()),
    }
}

fn error_response(kind: &str, message: String) -> messages::AnswerResponse {
    messages::AnswerResponse {
        status: "error".to_string(),
        response: None,
        kind: Some(kind.to_string()),
        message: Some(message),
    }
}

async fn post_answer<M>(State(orchestrator): Shared<M>, multipart: Multipart) -> Response
where
    M: MultimodalModel + Send + 'static,
{
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(error_response("bad_request", e))).into_response();
        }
    };

    match run_answer(orchestrator, submission).await {
        Ok((_, Some(outcome))) => {
            log::info!("Answered submission (success: {})", outcome.is_ok());
            (StatusCode::OK, Json(answer_response(outcome))).into_response()
        }
        Ok((_, None)) => {
            log::debug!("Orchestrator is still invoking");
            (
                StatusCode::CONFLICT,
                Json(error_response("busy", BUSY_MESSAGE.to_string())),
            )
                .into_response()
        }
        Err(e) => {
            log::error!("Answer task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_state<M>(State(orchestrator): Shared<M>) -> impl IntoResponse
where
    M: MultimodalModel + Send + 'static,
{
    Json(messages::StateResponse {
        status: orchestrator.state().as_str().to_string(),
    })
}

fn app<M>(orchestrator: Arc<AnswerOrchestrator<M>>) -> Router
where
    M: MultimodalModel + Send + 'static,
{
    Router::new()
        .route("/", get(get_page).post(post_page::<M>))
        .route("/api/answer", post(post_answer::<M>))
        .route("/api/state", get(get_state::<M>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(orchestrator)
}

async fn serve(
    args: ExtractorArgs,
    orchestrator: Arc<AnswerOrchestrator<GeminiClient>>,
) -> Result<(), Box<dyn std::error::Error>> {
    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    log::info!("Starting the server");
    log::info!("Listening on: http://{}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(orchestrator)).await?;

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ExtractorArgs = argh::from_env();

    let config = GeminiConfig::from_env()?;
    log::info!("Using model {} at {}", config.model, config.base_url);

    // the blocking HTTP client has to be created and dropped outside the async runtime
    let orchestrator = Arc::new(AnswerOrchestrator::new(GeminiClient::new(config)?));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(args, orchestrator.clone()))?;

    Ok(())
}
