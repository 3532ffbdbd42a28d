use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::parser::strip_code_fence;
use crate::request;
use crate::tools::{check_tool_name, require_string_param};
use crate::traits::{Message, Provider, Tool, ToolError, ToolUse};

/// One detection, with normalized `[x1, y1, x2, y2]` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub confidence: f64,
    pub xyxy: Vec<f64>,
}

impl BoundingBox {
    pub fn validated(confidence: f64, xyxy: Vec<f64>) -> Result<Self, ToolError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ToolError::InvalidInput(
                "Confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if xyxy.len() != 4 {
            return Err(ToolError::InvalidInput(
                "xyxy must contain exactly 4 coordinates".to_string(),
            ));
        }
        if xyxy.iter().any(|coord| !(0.0..=1.0).contains(coord)) {
            return Err(ToolError::InvalidInput(
                "Normalized coordinates must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(Self { confidence, xyxy })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectOutput {
    pub width: u32,
    pub height: u32,
    pub boxes: Vec<BoundingBox>,
}

#[derive(Debug, Deserialize)]
struct DetectionReply {
    boxes: Vec<ReplyBox>,
}

#[derive(Debug, Deserialize)]
struct ReplyBox {
    #[serde(default = "default_confidence")]
    confidence: f64,
    xyxy: Vec<f64>,
}

fn default_confidence() -> f64 {
    1.0
}

/// Detects objects matching a label in a local image by delegating to a
/// vision-capable provider and validating its structured reply.
pub struct DetectBoundingBoxTool {
    provider: Arc<dyn Provider>,
}

impl DetectBoundingBoxTool {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    fn detection_prompt(image_path: &str, label: &str) -> String {
        format!(
            "Detect every instance of \"{}\" in the image at {}. Respond with only a JSON \
             object of the form {{\"boxes\": [{{\"confidence\": 0.95, \"xyxy\": [x1, y1, x2, \
             y2]}}]}} where all coordinates are normalized to the 0.0-1.0 range.",
            label, image_path
        )
    }

    fn parse_reply(raw: &str) -> Result<Vec<BoundingBox>, ToolError> {
        let reply: DetectionReply =
            serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
                ToolError::InvalidInput(format!("Failed to parse bounding box response: {}", e))
            })?;

        reply
            .boxes
            .into_iter()
            .map(|b| BoundingBox::validated(b.confidence, b.xyxy))
            .collect()
    }
}

#[async_trait]
impl Tool for DetectBoundingBoxTool {
    fn name(&self) -> &str {
        "detect_bounding_box"
    }

    fn description(&self) -> &str {
        "Detects objects matching a label in a local image and returns normalized bounding boxes"
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "image_path": {
                "type": "string",
                "description": "Local file path to the image to analyze"
            },
            "label": {
                "type": "string",
                "description": "Object label to detect, e.g. 'button' or 'dog'"
            }
        })
    }

    async fn execute(&self, tool_use: &ToolUse) -> Result<serde_json::Value, ToolError> {
        check_tool_name(self.name(), tool_use)?;

        let image_path = require_string_param(&tool_use.params, "image_path")?;
        let label = require_string_param(&tool_use.params, "label")?;

        let (width, height) = image::image_dimensions(&image_path).map_err(|e| {
            ToolError::InvalidInput(format!("Failed to load image from {}: {}", image_path, e))
        })?;

        let prompt = Self::detection_prompt(&image_path, &label);
        let raw = self
            .provider
            .generate_response(&[Message::user(prompt)])
            .await
            .map_err(|e| ToolError::Upstream(format!("Failed to call vision provider: {}", e)))?;

        let boxes = Self::parse_reply(&raw)?;

        tracing::debug!(
            request_id = ?request::current_request_id(),
            label = %label,
            detections = boxes.len(),
            "detection complete"
        );

        let output = DetectOutput {
            width,
            height,
            boxes,
        };
        serde_json::to_value(&output)
            .map_err(|e| ToolError::Upstream(format!("Failed to serialize detections: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FixedProvider {
        reply: anyhow::Result<String>,
    }

    impl FixedProvider {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(anyhow::anyhow!("{}", message.to_string())),
            })
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        async fn generate_response(&self, _messages: &[Message]) -> anyhow::Result<String> {
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    fn test_image(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("test.png");
        image::RgbImage::new(64, 48).save(&path).unwrap();
        path
    }

    fn detect_use(params: serde_json::Value) -> ToolUse {
        ToolUse::new("detect_bounding_box", params)
    }

    #[test]
    fn box_validation() {
        assert!(BoundingBox::validated(0.95, vec![0.1, 0.2, 0.3, 0.4]).is_ok());

        let err = BoundingBox::validated(-0.1, vec![0.1, 0.2, 0.3, 0.4]).unwrap_err();
        assert!(err.to_string().contains("Confidence must be between"));
        let err = BoundingBox::validated(1.1, vec![0.1, 0.2, 0.3, 0.4]).unwrap_err();
        assert!(err.to_string().contains("Confidence must be between"));

        let err = BoundingBox::validated(0.9, vec![0.1, 0.2, 0.3]).unwrap_err();
        assert!(err.to_string().contains("exactly 4 coordinates"));

        let err = BoundingBox::validated(0.9, vec![-0.1, 0.2, 0.3, 0.4]).unwrap_err();
        assert!(err.to_string().contains("Normalized coordinates"));
        let err = BoundingBox::validated(0.9, vec![0.1, 0.2, 0.3, 1.1]).unwrap_err();
        assert!(err.to_string().contains("Normalized coordinates"));
    }

    #[test]
    fn parses_fenced_reply() {
        let raw = "```json\n{\"boxes\": [{\"confidence\": 0.9, \"xyxy\": [0.1, 0.2, 0.3, 0.4]}]}\n```";
        let boxes = DetectBoundingBoxTool::parse_reply(raw).unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].confidence, 0.9);
    }

    #[test]
    fn rejects_malformed_reply() {
        let err = DetectBoundingBoxTool::parse_reply("{\"boxes\": [broken}").unwrap_err();
        assert!(
            err.to_string()
                .contains("Failed to parse bounding box response")
        );
    }

    #[tokio::test]
    async fn successful_detection() {
        let tmp = TempDir::new().unwrap();
        let path = test_image(&tmp);
        let provider = FixedProvider::ok(
            r#"{"boxes": [{"confidence": 0.92, "xyxy": [0.1, 0.2, 0.3, 0.4]}]}"#,
        );
        let tool = DetectBoundingBoxTool::new(provider);

        let output = tool
            .execute(&detect_use(json!({
                "image_path": path.to_string_lossy(),
                "label": "button"
            })))
            .await
            .unwrap();

        let output: DetectOutput = serde_json::from_value(output).unwrap();
        assert_eq!(output.width, 64);
        assert_eq!(output.height, 48);
        assert_eq!(output.boxes.len(), 1);
        assert_eq!(output.boxes[0].confidence, 0.92);
        assert_eq!(output.boxes[0].xyxy, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[tokio::test]
    async fn missing_image_path_is_invalid_input() {
        let tool = DetectBoundingBoxTool::new(FixedProvider::ok(r#"{"boxes": []}"#));

        let err = tool
            .execute(&detect_use(json!({"label": "button"})))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(err.to_string().contains("image_path parameter is required"));
    }

    #[tokio::test]
    async fn unreadable_image_is_invalid_input() {
        let tool = DetectBoundingBoxTool::new(FixedProvider::ok(r#"{"boxes": []}"#));

        let err = tool
            .execute(&detect_use(json!({
                "image_path": "/nonexistent/path/image.jpg",
                "label": "button"
            })))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to load image"));
    }

    #[tokio::test]
    async fn provider_failure_is_upstream() {
        let tmp = TempDir::new().unwrap();
        let path = test_image(&tmp);
        let tool = DetectBoundingBoxTool::new(FixedProvider::failing("API error"));

        let err = tool
            .execute(&detect_use(json!({
                "image_path": path.to_string_lossy(),
                "label": "button"
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Upstream(_)));
        assert!(err.to_string().contains("Failed to call vision provider"));
    }

    #[tokio::test]
    async fn unparseable_reply_is_invalid_input() {
        let tmp = TempDir::new().unwrap();
        let path = test_image(&tmp);
        let tool = DetectBoundingBoxTool::new(FixedProvider::ok("no detections, sorry"));

        let err = tool
            .execute(&detect_use(json!({
                "image_path": path.to_string_lossy(),
                "label": "button"
            })))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(
            err.to_string()
                .contains("Failed to parse bounding box response")
        );
    }

    #[tokio::test]
    async fn name_mismatch_is_rejected() {
        let tool = DetectBoundingBoxTool::new(FixedProvider::ok(r#"{"boxes": []}"#));

        let err = tool
            .execute(&ToolUse::new("draw_bounding_box", json!({})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Tool name mismatch"));
    }
}
