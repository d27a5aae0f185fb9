//! HTML rendering of the single extractor page.

use crate::{
    image_handle::{ALLOWED_EXTENSIONS, ALLOWED_FORMATS, ImageDecodeError, ImageHandle},
    orchestrator::{AnswerError, AnswerResult},
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

pub const PAGE_TITLE: &str = "Multilanguage Invoice Extractor";
pub const INPUT_LABEL: &str = "Input: ";
pub const UPLOAD_LABEL: &str = "Upload your Invoice image: ";
pub const PREVIEW_CAPTION: &str = "Uploaded image";
pub const SUBMIT_LABEL: &str = "Tell me about this invoice";
pub const RESPONSE_HEADING: &str = "The response is ";

/// Form field carrying the question.
pub const QUESTION_FIELD: &str = "input";
/// Form field carrying a freshly chosen file.
pub const UPLOAD_FIELD: &str = "invoice";
/// Hidden form field carrying the previously accepted image, so a new question
/// can be asked about the same invoice without uploading it again.
pub const RETAINED_FIELD: &str = "invoice_data";

const STYLE: &str = "body{font-family:sans-serif;max-width:46rem;margin:2rem auto;padding:0 1rem}\
label{display:block;margin-top:1rem}\
input[type=text]{width:100%;padding:.4rem}\
figure{margin:1rem 0}figure img{max-width:100%}\
button{margin-top:1rem;padding:.5rem 1rem}\
.response{white-space:pre-wrap}\
.warning{background:#fff6d5;padding:.75rem;border-radius:.3rem}\
.error{background:#fde2e2;padding:.75rem;border-radius:.3rem}";

const PREVIEW_SCRIPT: &str = "document.getElementById('invoice').addEventListener('change',function(e){\
var f=e.target.files[0];if(!f)return;var r=new FileReader();\
r.onload=function(){var i=document.getElementById('preview');i.src=r.result;\
document.getElementById('preview-figure').hidden=false;};r.readAsDataURL(f);});";

/// Everything needed to draw the page once.
#[derive(Default)]
pub struct PageView<'a> {
    pub question: &'a str,
    pub image: Option<&'a ImageHandle>,
    pub outcome: Option<&'a AnswerResult>,
}

/// Picks the image a submission carries.
///
/// A freshly uploaded file replaces the one retained from the previous page.
/// Anything that fails to decode counts as no image at all.
pub fn resolve_image(uploaded: Option<Vec<u8>>, retained: Option<&str>) -> Option<ImageHandle> {
    let uploaded = uploaded.filter(|bytes| !bytes.is_empty());
    let retained = retained.filter(|url| !url.is_empty());

    match (uploaded, retained) {
        (Some(bytes), _) => accept_decoded(ImageHandle::decode(bytes, &ALLOWED_FORMATS)),
        (None, Some(url)) => accept_decoded(ImageHandle::from_data_url(url)),
        (None, None) => None,
    }
}

fn accept_decoded(decoded: Result<ImageHandle, ImageDecodeError>) -> Option<ImageHandle> {
    match decoded {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("Ignoring uploaded file: {e}");
            None
        }
    }
}

pub fn render(view: &PageView<'_>) -> String {
    let mut html = String::with_capacity(4096);

    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{PAGE_TITLE}</title><style>{STYLE}</style></head><body>\
         <h1>{PAGE_TITLE}</h1>"
    );

    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let _ = write!(
        html,
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
         <label for=\"{QUESTION_FIELD}\">{INPUT_LABEL}</label>\
         <input type=\"text\" id=\"{QUESTION_FIELD}\" name=\"{QUESTION_FIELD}\" value=\"{}\">\
         <label for=\"{UPLOAD_FIELD}\">{UPLOAD_LABEL}</label>\
         <input type=\"file\" id=\"{UPLOAD_FIELD}\" name=\"{UPLOAD_FIELD}\" accept=\"{accept}\">",
        encode_double_quoted_attribute(view.question)
    );

    match view.image {
        Some(image) => {
            let data_url = image.data_url();
            let _ = write!(
                html,
                "<input type=\"hidden\" name=\"{RETAINED_FIELD}\" value=\"{data_url}\">\
                 <figure id=\"preview-figure\"><img id=\"preview\" src=\"{data_url}\" alt=\"{PREVIEW_CAPTION}\">\
                 <figcaption>{PREVIEW_CAPTION}</figcaption></figure>"
            );
        }
        None => {
            let _ = write!(
                html,
                "<figure id=\"preview-figure\" hidden><img id=\"preview\" alt=\"{PREVIEW_CAPTION}\">\
                 <figcaption>{PREVIEW_CAPTION}</figcaption></figure>"
            );
        }
    }

    let _ = write!(
        html,
        "<button type=\"submit\">{SUBMIT_LABEL}</button></form>"
    );

    match view.outcome {
        Some(Ok(answer)) => {
            let _ = write!(
                html,
                "<h2>{RESPONSE_HEADING}</h2><div class=\"response\">{}</div>",
                encode_text(answer)
            );
        }
        Some(Err(err @ AnswerError::MissingInput)) => {
            let _ = write!(html, "<div class=\"warning\">{}</div>", encode_text(&err.message()));
        }
        Some(Err(err @ AnswerError::Inference { .. })) => {
            let _ = write!(html, "<div class=\"error\">{}</div>", encode_text(&err.message()));
        }
        None => {}
    }

    let _ = write!(html, "<script>{PREVIEW_SCRIPT}</script></body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_handle::{
        ImageFormat,
        tests::{jpeg_bytes, png_bytes, png_handle},
    };

    #[test]
    fn empty_page_has_the_form() {
        let html = render(&PageView::default());

        assert!(html.contains("<title>Multilanguage Invoice Extractor</title>"));
        assert!(html.contains("<h1>Multilanguage Invoice Extractor</h1>"));
        assert!(html.contains(">Input: </label>"));
        assert!(html.contains(">Upload your Invoice image: </label>"));
        assert!(html.contains("accept=\".jpg,.jpeg,.png\""));
        assert!(html.contains(">Tell me about this invoice</button>"));
        assert!(!html.contains(RESPONSE_HEADING));
        assert!(!html.contains(RETAINED_FIELD));
    }

    #[test]
    fn success_shows_heading_and_escaped_answer() {
        let outcome: AnswerResult = Ok("Total: <b>$42.00</b>".to_string());
        let html = render(&PageView {
            question: "What's the \"total\"?",
            image: None,
            outcome: Some(&outcome),
        });

        assert!(html.contains("<h2>The response is </h2>"));
        assert!(html.contains("Total: &lt;b&gt;$42.00&lt;/b&gt;"));
        assert!(html.contains("value=\"What's the &quot;total&quot;?\""));
    }

    #[test]
    fn missing_image_is_a_warning() {
        let outcome: AnswerResult = Err(AnswerError::MissingInput);
        let html = render(&PageView {
            outcome: Some(&outcome),
            ..Default::default()
        });

        assert!(html.contains("<div class=\"warning\">Please upload an invoice image first.</div>"));
        assert!(!html.contains("class=\"error\""));
    }

    #[test]
    fn inference_failure_is_an_error() {
        let outcome: AnswerResult = Err(AnswerError::Inference {
            details: "upstream timed out".into(),
        });
        let html = render(&PageView {
            outcome: Some(&outcome),
            ..Default::default()
        });

        assert!(html.contains(
            "<div class=\"error\">An error occurred while getting response from Gemini: upstream timed out</div>"
        ));
    }

    #[test]
    fn accepted_image_is_previewed_and_retained() {
        let image = png_handle(2, 2);
        let html = render(&PageView {
            image: Some(&image),
            ..Default::default()
        });

        assert!(html.contains(&format!("src=\"{}\"", image.data_url())));
        assert!(html.contains("<figcaption>Uploaded image</figcaption>"));
        assert!(html.contains(&format!("name=\"{RETAINED_FIELD}\" value=\"{}\"", image.data_url())));
    }

    #[test]
    fn fresh_upload_replaces_retained_image() {
        let retained = png_handle(2, 2).data_url();

        let image = resolve_image(Some(jpeg_bytes(3, 3)), Some(&retained)).unwrap();

        assert_eq!(image.format(), ImageFormat::Jpeg);
        assert_eq!((image.width(), image.height()), (3, 3));
    }

    #[test]
    fn retained_image_is_used_without_upload() {
        let retained = png_handle(2, 2).data_url();

        let image = resolve_image(None, Some(&retained)).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);

        // browsers send an empty file part when nothing was chosen
        let image = resolve_image(Some(Vec::new()), Some(&retained)).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
    }

    #[test]
    fn undecodable_upload_counts_as_missing() {
        let retained = png_handle(2, 2).data_url();

        assert!(resolve_image(Some(b"not an image".to_vec()), None).is_none());
        assert!(resolve_image(Some(b"not an image".to_vec()), Some(&retained)).is_none());
        assert!(resolve_image(None, Some("data:image/png;base64,@@")).is_none());
        assert!(resolve_image(None, Some("")).is_none());
        assert!(resolve_image(None, None).is_none());

        let mut truncated = png_bytes(4, 4);
        truncated.truncate(16);
        assert!(resolve_image(Some(truncated), None).is_none());
    }
}
