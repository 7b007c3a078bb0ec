use std::fmt;

/// 段落换行标记。
pub const HARD_BREAK: &str = "\\P";
/// 首行之后不再沿用基线的换行标记，仅用于标注覆盖文字。
pub const DROP_BASELINE_BREAK: &str = "\\X";
/// 原有文字为空时的占位内容。
pub const BLANK_PLACEHOLDER: &str = "<blank>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreak {
    Hard,
    DropBaseline,
}

impl LineBreak {
    #[inline]
    pub fn marker(self) -> &'static str {
        match self {
            LineBreak::Hard => HARD_BREAK,
            LineBreak::DropBaseline => DROP_BASELINE_BREAK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Break(LineBreak),
}

/// 组合标签：文字段与换行标记交替排列，段顺序固定为公司、测量值/用途、编号。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositeLabel {
    segments: Vec<Segment>,
}

impl CompositeLabel {
    fn push_text(&mut self, text: impl Into<String>) {
        self.segments.push(Segment::Text(text.into()));
    }

    fn push_break(&mut self, kind: LineBreak) {
        self.segments.push(Segment::Break(kind));
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn line_count(&self) -> usize {
        1 + self
            .segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Break(_)))
            .count()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CompositeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => f.write_str(text)?,
                Segment::Break(kind) => f.write_str(kind.marker())?,
            }
        }
        Ok(())
    }
}

/// 已完成替换与格式化的属性字段。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFields {
    pub company: String,
    pub purpose: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Copy)]
pub enum AssemblyMode<'a> {
    /// 标注覆盖文字：`公司\X测量值 用途\P编号`。
    Override { measurement: &'a str },
    /// 独立文字：`公司\P中间段 用途\P编号`；新建时没有中间段。
    FreeLabel { middle: Option<&'a str> },
}

pub fn assemble(fields: &LabelFields, mode: AssemblyMode<'_>) -> CompositeLabel {
    let mut label = CompositeLabel::default();
    label.push_text(fields.company.as_str());
    match mode {
        AssemblyMode::Override { measurement } => {
            label.push_break(LineBreak::DropBaseline);
            label.push_text(format!("{} {}", measurement, fields.purpose));
        }
        AssemblyMode::FreeLabel { middle: Some(middle) } => {
            let middle = match middle.trim() {
                "" => BLANK_PLACEHOLDER,
                trimmed => trimmed,
            };
            label.push_break(LineBreak::Hard);
            label.push_text(format!("{} {}", middle, fields.purpose));
        }
        AssemblyMode::FreeLabel { middle: None } => {
            label.push_break(LineBreak::Hard);
            label.push_text(fields.purpose.as_str());
        }
    }
    label.push_break(LineBreak::Hard);
    label.push_text(fields.identifier.as_str());
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> LabelFields {
        LabelFields {
            company: "ACME CORP".to_string(),
            purpose: "Pipeline".to_string(),
            identifier: "LOC 4821".to_string(),
        }
    }

    #[test]
    fn override_mode_drops_baseline_after_company() {
        let label = assemble(
            &fields(),
            AssemblyMode::Override {
                measurement: "12.00",
            },
        );
        assert_eq!(label.render(), r"ACME CORP\X12.00 Pipeline\PLOC 4821");
        assert_eq!(label.line_count(), 3);
        assert_eq!(
            label.segments()[1],
            Segment::Break(LineBreak::DropBaseline)
        );
    }

    #[test]
    fn free_label_keeps_existing_text_trimmed() {
        let label = assemble(
            &fields(),
            AssemblyMode::FreeLabel {
                middle: Some("  8\" steel  "),
            },
        );
        assert_eq!(label.render(), "ACME CORP\\P8\" steel Pipeline\\PLOC 4821");
    }

    #[test]
    fn blank_middle_uses_placeholder() {
        let label = assemble(&fields(), AssemblyMode::FreeLabel { middle: Some(" \n ") });
        assert_eq!(label.render(), r"ACME CORP\P<blank> Pipeline\PLOC 4821");
    }

    #[test]
    fn new_label_has_purpose_alone_on_middle_line() {
        let label = assemble(&fields(), AssemblyMode::FreeLabel { middle: None });
        assert_eq!(label.render(), r"ACME CORP\PPipeline\PLOC 4821");
        assert!(
            label
                .segments()
                .iter()
                .all(|segment| *segment != Segment::Break(LineBreak::DropBaseline))
        );
    }

    #[test]
    fn empty_fields_keep_segment_order() {
        let label = assemble(
            &LabelFields::default(),
            AssemblyMode::Override { measurement: "4" },
        );
        assert_eq!(label.render(), r"\X4 \P");
        assert_eq!(label.line_count(), 3);
    }
}
