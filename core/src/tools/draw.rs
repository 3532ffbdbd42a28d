use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::Rgba;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde_json::{Value, json};

use crate::request;
use crate::tools::{
    BoundingBox, check_tool_name, optional_string_param, optional_u32_param, require_param,
    require_string_param,
};
use crate::traits::{Tool, ToolError, ToolUse};

const DEFAULT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const DEFAULT_LINE_WIDTH: u32 = 3;

/// Draws bounding boxes onto a local image and writes the annotated copy.
pub struct DrawBoundingBoxTool;

impl DrawBoundingBoxTool {
    pub fn new() -> Self {
        Self
    }

    /// Accepts either a detect-style output object carrying a `boxes` key or
    /// a bare list of `{xyxy, confidence?}` entries. Entries without `xyxy`
    /// are skipped; coordinates may be normalized or already in pixels.
    fn parse_boxes(data: &Value) -> Result<Vec<BoundingBox>, ToolError> {
        let entries = match data {
            Value::Object(map) => map
                .get("boxes")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid_boxes_format(data))?,
            Value::Array(entries) => entries,
            _ => return Err(invalid_boxes_format(data)),
        };

        let mut boxes = Vec::new();
        for entry in entries {
            let Some(xyxy) = entry.get("xyxy").and_then(Value::as_array) else {
                continue;
            };
            let coords: Vec<f64> = xyxy.iter().filter_map(Value::as_f64).collect();
            if coords.len() != 4 {
                continue;
            }
            boxes.push(BoundingBox {
                confidence: entry
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .unwrap_or(1.0),
                xyxy: coords,
            });
        }

        if boxes.is_empty() {
            return Err(ToolError::InvalidInput(
                "No valid boxes found in the provided data".to_string(),
            ));
        }
        Ok(boxes)
    }

    fn output_path(input_path: &str, output_path: Option<String>) -> PathBuf {
        if let Some(path) = output_path {
            return PathBuf::from(path);
        }

        let input = Path::new(input_path);
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "annotated".to_string());
        let file_name = match input.extension() {
            Some(ext) => format!("{}_annotated.{}", stem, ext.to_string_lossy()),
            None => format!("{}_annotated", stem),
        };
        input.with_file_name(file_name)
    }

    fn parse_color(color: &str) -> Rgba<u8> {
        match color.to_lowercase().as_str() {
            "red" => Rgba([255, 0, 0, 255]),
            "green" => Rgba([0, 255, 0, 255]),
            "blue" => Rgba([0, 0, 255, 255]),
            "yellow" => Rgba([255, 255, 0, 255]),
            "cyan" => Rgba([0, 255, 255, 255]),
            "magenta" => Rgba([255, 0, 255, 255]),
            "white" => Rgba([255, 255, 255, 255]),
            "black" => Rgba([0, 0, 0, 255]),
            "orange" => Rgba([255, 165, 0, 255]),
            "purple" => Rgba([128, 0, 128, 255]),
            "pink" => Rgba([255, 192, 203, 255]),
            other => Self::parse_hex_color(other).unwrap_or(DEFAULT_COLOR),
        }
    }

    fn parse_hex_color(color: &str) -> Option<Rgba<u8>> {
        let hex = color.strip_prefix('#')?;
        let expanded = match hex.len() {
            6 => hex.to_string(),
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            _ => return None,
        };
        let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
        let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
        let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
        Some(Rgba([r, g, b, 255]))
    }

    fn draw_box(
        canvas: &mut image::RgbaImage,
        bounding_box: &BoundingBox,
        color: Rgba<u8>,
        line_width: u32,
    ) {
        let (width, height) = canvas.dimensions();
        let [x1, y1, x2, y2]: [f64; 4] = match bounding_box.xyxy.as_slice().try_into() {
            Ok(coords) => coords,
            Err(_) => return,
        };

        // Normalized coordinates scale to pixels; anything else is treated
        // as already being in pixel space.
        let normalized = [x1, y1, x2, y2]
            .iter()
            .all(|coord| (0.0..=1.0).contains(coord));
        let (px1, py1, px2, py2) = if normalized {
            (
                (x1 * f64::from(width)) as i64,
                (y1 * f64::from(height)) as i64,
                (x2 * f64::from(width)) as i64,
                (y2 * f64::from(height)) as i64,
            )
        } else {
            (x1 as i64, y1 as i64, x2 as i64, y2 as i64)
        };

        for inset in 0..i64::from(line_width) {
            let w = px2 - px1 - 2 * inset;
            let h = py2 - py1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at((px1 + inset) as i32, (py1 + inset) as i32)
                .of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

impl Default for DrawBoundingBoxTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DrawBoundingBoxTool {
    fn name(&self) -> &str {
        "draw_bounding_box"
    }

    fn description(&self) -> &str {
        "Draws bounding boxes on an image using the provided coordinates"
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "image_path": {
                "type": "string",
                "description": "Local file path to the image to draw on"
            },
            "boxes": {
                "type": "object",
                "description": "Boxes to draw: either a detect_bounding_box output object or a list of {xyxy, confidence?} entries with normalized coordinates"
            },
            "output_path": {
                "type": "string",
                "description": "Optional output file path; defaults to the input path with an '_annotated' suffix"
            },
            "color": {
                "type": "string",
                "description": "Line color as a name or hex code (default: 'red')"
            },
            "line_width": {
                "type": "integer",
                "description": "Line width in pixels (default: 3)"
            }
        })
    }

    async fn execute(&self, tool_use: &ToolUse) -> Result<serde_json::Value, ToolError> {
        check_tool_name(self.name(), tool_use)?;

        let image_path = require_string_param(&tool_use.params, "image_path")?;
        let boxes = Self::parse_boxes(require_param(&tool_use.params, "boxes")?)?;
        let output_path = Self::output_path(
            &image_path,
            optional_string_param(&tool_use.params, "output_path"),
        );
        let color = optional_string_param(&tool_use.params, "color")
            .map(|c| Self::parse_color(&c))
            .unwrap_or(DEFAULT_COLOR);
        let line_width = optional_u32_param(&tool_use.params, "line_width", DEFAULT_LINE_WIDTH);

        let image = image::open(&image_path).map_err(|e| {
            ToolError::InvalidInput(format!("Failed to load image from {}: {}", image_path, e))
        })?;
        let mut canvas = image.to_rgba8();

        for bounding_box in &boxes {
            Self::draw_box(&mut canvas, bounding_box, color, line_width);
        }

        canvas.save(&output_path).map_err(|e| {
            ToolError::Upstream(format!(
                "Failed to save annotated image to {}: {}",
                output_path.display(),
                e
            ))
        })?;

        tracing::info!(
            request_id = ?request::current_request_id(),
            boxes_drawn = boxes.len(),
            output = %output_path.display(),
            "drew bounding boxes"
        );

        Ok(json!({
            "output_path": output_path.to_string_lossy(),
            "boxes_drawn": boxes.len()
        }))
    }
}

fn invalid_boxes_format(data: &Value) -> ToolError {
    ToolError::InvalidInput(format!(
        "Invalid boxes format: expected a list of boxes or an object with a 'boxes' key, got {}",
        match data {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        }
    ))
}
