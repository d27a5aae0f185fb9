use argh::FromArgs;
use invoice_extractor::{
    ImageFormat,
    page::{QUESTION_FIELD, UPLOAD_FIELD},
};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

mod messages;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Invoice extractor client for asking questions and checking the server state
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "ask" or "state"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Ask(AskCommand),
    State(StateCommand),
}

#[derive(FromArgs)]
/// Ask a question about an invoice image
#[argh(subcommand, name = "ask")]
struct AskCommand {
    /// the path to the invoice image (jpg, jpeg or png)
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// the question to ask, may be empty
    #[argh(option, short = 'q', default = "String::new()")]
    question: String,
}

#[derive(FromArgs)]
/// Check whether the server is answering a question
#[argh(subcommand, name = "state")]
struct StateCommand {}

fn image_part(path: &Path) -> Result<Part, Box<dyn std::error::Error>> {
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .ok_or_else(|| format!("Unsupported image file: {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "invoice".to_string());

    let bytes = std::fs::read(path)?;
    Ok(Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(format.mime_type())?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Ask(ask_command) => {
            let form = Form::new()
                .text(QUESTION_FIELD, ask_command.question)
                .part(UPLOAD_FIELD, image_part(&ask_command.image_path)?);

            let response = client
                .post(format!("http://{}/api/answer", addr))
                .multipart(form)
                .send()
                .await?;

            let result = response.json::<messages::AnswerResponse>().await?;
            match (result.response, result.message) {
                (Some(text), _) => println!("The response is:\n{text}"),
                (None, Some(message)) => eprintln!("{message}"),
                (None, None) => eprintln!("Unexpected reply with status {}", result.status),
            }
        }
        ClientCommands::State(_) => {
            let response = client
                .get(format!("http://{}/api/state", addr))
                .send()
                .await?;

            let result = response.json::<messages::StateResponse>().await?;
            println!("State: {}", result.status);
        }
    }

    Ok(())
}
