use serde::{ Serialize, Deserialize };
use crate::models::chat::TranscriptEntry;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
        #[serde(default)]
        model: Option<String>,
    },
    /// `data` is the base64 form of the uploaded file.
    #[serde(rename = "upload_image")] UploadImage {
        filename: String,
        data: String,
    },
    #[serde(rename = "clear_image")]
    ClearImage,
    #[serde(rename = "select_model")] SelectModel {
        model: String,
    },
    #[serde(rename = "history")]
    History,
    #[serde(rename = "list_models")]
    ListModels,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session")] Session {
        id: String,
        model: String,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "partial")] Partial {
        content: String,
        in_progress: bool,
    },
    #[serde(rename = "response")] Response {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        remedy: Option<String>,
    },
    #[serde(rename = "history")] History {
        messages: Vec<TranscriptEntry>,
    },
    #[serde(rename = "models")] Models {
        models: Vec<String>,
    },
    #[serde(rename = "image_attached")] ImageAttached {
        filename: String,
        size: usize,
    },
    #[serde(rename = "image_cleared")]
    ImageCleared,
    #[serde(rename = "model_selected")] ModelSelected {
        model: String,
    },
}
