use dimlabel_core::document::Document;
use dimlabel_core::geometry::{Point3, Vector3};

use crate::errors::EngineError;
use crate::text::{DROP_BASELINE_BREAK, HARD_BREAK};

/// 样式字高缺失或过小时使用的默认字高。
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;
pub const TEXT_HEIGHT_TOLERANCE: f64 = 1e-10;

/// 宿主的样式字高接口。未知样式返回 0，由调用方回退到默认值。
pub trait TextStyleSource {
    fn text_height(&self, style: &str) -> f64;
}

impl TextStyleSource for Document {
    fn text_height(&self, style: &str) -> f64 {
        self.dim_style(style)
            .map(|style| style.text_height)
            .unwrap_or(0.0)
    }
}

/// 两种换行标记都计为行分隔符。
pub fn line_count(composite: &str) -> usize {
    composite
        .split(HARD_BREAK)
        .map(|part| part.split(DROP_BASELINE_BREAK).count())
        .sum()
}

pub fn resolve_text_height(height: f64, fallback: f64) -> f64 {
    if height > TEXT_HEIGHT_TOLERANCE {
        height
    } else {
        fallback
    }
}

/// 按默认回退字高计算偏移：`h * 0.5 * max(1, n - 1)`。
pub fn compute_offset(composite: &str, text_height: f64) -> f64 {
    LabelPlacer::default().offset(composite, text_height)
}

/// 标注所在平面的方向框架：两条尺寸界线起点确定主方向，`normal` 为平面法向。
#[derive(Debug, Clone, Copy)]
pub struct PlacementFrame {
    pub start: Point3,
    pub end: Point3,
    pub normal: Vector3,
}

impl PlacementFrame {
    /// 平面内垂直于主方向的单位向量。
    pub fn perpendicular(&self) -> Option<Vector3> {
        let x_dir = Vector3::from_points(self.start, self.end).normalize()?;
        x_dir.cross(self.normal).normalize()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LabelPlacer {
    fallback_height: f64,
}

impl Default for LabelPlacer {
    fn default() -> Self {
        Self {
            fallback_height: DEFAULT_TEXT_HEIGHT,
        }
    }
}

impl LabelPlacer {
    /// 配置的回退字高本身无效时仍使用默认值。
    pub fn new(fallback_height: f64) -> Self {
        Self {
            fallback_height: resolve_text_height(fallback_height, DEFAULT_TEXT_HEIGHT),
        }
    }

    #[inline]
    pub fn fallback_height(&self) -> f64 {
        self.fallback_height
    }

    pub fn offset(&self, composite: &str, text_height: f64) -> f64 {
        let height = resolve_text_height(text_height, self.fallback_height);
        let lines = line_count(composite);
        let factor = (lines.saturating_sub(1) as f64).max(1.0);
        height * 0.5 * factor
    }

    /// 将文字位置沿平面内垂直方向朝被标注对象移动 `offset`。
    pub fn reposition(
        &self,
        position: Point3,
        frame: &PlacementFrame,
        offset: f64,
    ) -> Result<Point3, EngineError> {
        let y_dir = frame
            .perpendicular()
            .ok_or(EngineError::DegenerateGeometry(
                "dimension direction or normal has zero length",
            ))?;
        Ok(position.translate(-(y_dir * offset)))
    }
}
