use std::collections::HashMap;

use dimlabel_config::{AppConfig, FieldNames, MeasurementMode};
use dimlabel_core::document::{
    AlignedDimension, Document, Entity, EntityId, MText, Transaction,
};
use dimlabel_core::geometry::Point3;
use dimlabel_io::Journal;
use tracing::{debug, info, warn};

use crate::dimension::DimensionValue;
use crate::errors::EngineError;
use crate::identifier::insert_space;
use crate::lookup::LookupTables;
use crate::placement::{LabelPlacer, PlacementFrame, TextStyleSource};
use crate::record::AttributeRecordReader;
use crate::text::{AssemblyMode, LabelFields, assemble};

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

/// 标注命令的运行参数，由调度层从配置构建。
#[derive(Debug, Clone)]
pub struct LabelSettings {
    pub fields: FieldNames,
    pub measurement: MeasurementMode,
    pub fallback_text_height: f64,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl LabelSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fields: config.fields.clone(),
            measurement: config.dimension.measurement,
            fallback_text_height: config.placement.fallback_text_height,
        }
    }
}

pub struct CommandContext<'a> {
    pub document: &'a mut Document,
    pub lookups: &'a LookupTables,
    pub settings: &'a LabelSettings,
    pub journal: &'a mut dyn Journal,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(UpdateDimensionCommand::default());
        bus.register(UpdateMTextCommand::default());
        bus.register(CreateMTextCommand::default());
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    /// 命令名不区分大小写。
    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let name = request.name.to_ascii_uppercase();
        if let Some(handler) = self.handlers.get(name.as_str()) {
            debug!(command = handler.name(), args = ?request.args, "分发命令");
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

enum LabelOutcome {
    Applied {
        target: EntityId,
        text: String,
        echo_text: bool,
    },
    NothingToAnnotate {
        feature: EntityId,
    },
}

/// 统一记录命令结果：成功、跳过、失败各写一行日志。
fn finish(
    command: &'static str,
    result: Result<LabelOutcome, EngineError>,
    journal: &mut dyn Journal,
) -> CommandResponse {
    match result {
        Ok(LabelOutcome::Applied {
            target,
            text,
            echo_text,
        }) => {
            if echo_text {
                journal.record(&format!("{command} success ({target})  →  \"{text}\""));
            } else {
                journal.record(&format!("{command} success ({target})"));
            }
            info!(command, target = target.get(), text = %text, "标注已更新");
            CommandResponse::ok(format!("已更新实体 {target}: {text}"))
        }
        Ok(LabelOutcome::NothingToAnnotate { feature }) => {
            journal.record(&format!(
                "{command} skipped ({feature}): nothing to annotate"
            ));
            warn!(command, feature = feature.get(), "未找到属性数据");
            CommandResponse::err("未找到属性数据，未做任何更新")
        }
        Err(err) => {
            journal.record(&format!("{command} error: {err:?}"));
            warn!(command, error = %err, "标注命令执行失败");
            CommandResponse::err(format!("{command} 执行失败: {err}"))
        }
    }
}

fn entity_arg(args: &[String], index: usize, role: &str) -> Result<EntityId, EngineError> {
    let raw = args
        .get(index)
        .ok_or_else(|| EngineError::InvalidArgument(format!("missing {role} id")))?;
    raw.trim()
        .parse::<u64>()
        .map(EntityId::new)
        .map_err(|_| EngineError::InvalidArgument(format!("{role} id `{raw}` is not a number")))
}

fn coordinate_arg(args: &[String], index: usize, axis: &str) -> Result<Option<f64>, EngineError> {
    let Some(raw) = args.get(index) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| EngineError::InvalidArgument(format!("{axis} coordinate `{raw}` is invalid")))
}

fn measurement_arg(raw: &str) -> Result<MeasurementMode, EngineError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "plain" => Ok(MeasurementMode::Plain),
        "palette" => Ok(MeasurementMode::Palette),
        other => Err(EngineError::InvalidArgument(format!(
            "unknown measurement mode `{other}`"
        ))),
    }
}

fn require_entity(document: &Document, id: EntityId) -> Result<&Entity, EngineError> {
    document
        .entity(id)
        .ok_or(EngineError::EntityNotFound(id.get()))
}

fn unexpected(id: EntityId, expected: &'static str, found: &Entity) -> EngineError {
    EngineError::UnexpectedEntity {
        id: id.get(),
        expected,
        found: found.kind_name(),
    }
}

/// 读取首条属性记录并完成编号格式化与两张表的替换；缺失字段按空串处理。
fn read_label_fields(
    reader: &AttributeRecordReader,
    document: &Document,
    feature: EntityId,
    lookups: &LookupTables,
    names: &FieldNames,
) -> Option<LabelFields> {
    let record = reader.read_first_record(document, feature)?;
    Some(LabelFields {
        company: lookups
            .company
            .lookup(record.get_or_empty(&names.company))
            .to_string(),
        purpose: lookups
            .purpose
            .lookup(record.get_or_empty(&names.purpose))
            .to_string(),
        identifier: insert_space(record.get_or_empty(&names.identifier)),
    })
}

fn write_dimension_label(
    tx: &mut Transaction<'_>,
    id: EntityId,
    text: &str,
    position: Point3,
) -> Result<(), EngineError> {
    match tx.open_for_write(id) {
        Some(Entity::AlignedDimension(target)) => {
            target.text = text.to_string();
            target.text_position = position;
            Ok(())
        }
        Some(other) => Err(unexpected(id, "aligned dimension", other)),
        None => Err(EngineError::EntityNotFound(id.get())),
    }
}

fn write_mtext_label(
    tx: &mut Transaction<'_>,
    id: EntityId,
    text: &str,
) -> Result<(), EngineError> {
    match tx.open_for_write(id) {
        Some(Entity::MText(target)) => {
            target.contents = text.to_string();
            Ok(())
        }
        Some(other) => Err(unexpected(id, "mtext", other)),
        None => Err(EngineError::EntityNotFound(id.get())),
    }
}

/// 不含控制码的非空覆盖文字视为用户手动输入，原样保留。
fn measurement_text(dimension: &AlignedDimension, mode: MeasurementMode) -> String {
    let manual = &dimension.text;
    if !manual.trim().is_empty() && !manual.contains('\\') {
        info!(text = %manual, "使用手动标注文字");
        manual.clone()
    } else {
        DimensionValue::render(dimension.measurement, mode).rendered
    }
}

/// UPD：重写对齐标注文字，并按行数将文字块移回锚点。
#[derive(Default)]
pub struct UpdateDimensionCommand {
    reader: AttributeRecordReader,
}

impl UpdateDimensionCommand {
    fn run(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<LabelOutcome, EngineError> {
        let dimension_id = entity_arg(&request.args, 0, "dimension")?;
        let feature_id = entity_arg(&request.args, 1, "feature")?;
        let settings = context.settings;
        let mode = match request.args.get(2) {
            Some(raw) => measurement_arg(raw)?,
            None => settings.measurement,
        };

        let lookups = context.lookups;
        let mut tx = context.document.transaction();
        let dimension = match require_entity(tx.document(), dimension_id)? {
            Entity::AlignedDimension(dimension) => dimension.clone(),
            other => return Err(unexpected(dimension_id, "aligned dimension", other)),
        };
        require_entity(tx.document(), feature_id)?;

        let Some(fields) = read_label_fields(
            &self.reader,
            tx.document(),
            feature_id,
            lookups,
            &settings.fields,
        ) else {
            tx.abort();
            return Ok(LabelOutcome::NothingToAnnotate {
                feature: feature_id,
            });
        };

        let measurement = measurement_text(&dimension, mode);
        let text = assemble(
            &fields,
            AssemblyMode::Override {
                measurement: &measurement,
            },
        )
        .render();

        let placer = LabelPlacer::new(settings.fallback_text_height);
        let offset = placer.offset(&text, tx.document().text_height(&dimension.style));
        let frame = PlacementFrame {
            start: dimension.x_line1,
            end: dimension.x_line2,
            normal: dimension.normal,
        };
        let position = placer.reposition(dimension.text_position, &frame, offset)?;
        debug!(
            dimension = dimension_id.get(),
            offset,
            x = position.x(),
            y = position.y(),
            "标注文字已重新定位"
        );

        write_dimension_label(&mut tx, dimension_id, &text, position)?;
        tx.commit();

        Ok(LabelOutcome::Applied {
            target: dimension_id,
            text,
            echo_text: true,
        })
    }
}

impl CommandHandler for UpdateDimensionCommand {
    fn name(&self) -> &'static str {
        "UPD"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = self.run(request, context);
        finish(self.name(), result, context.journal)
    }
}

/// UPM：以多行文字原有内容作为中间段重写。
#[derive(Default)]
pub struct UpdateMTextCommand {
    reader: AttributeRecordReader,
}

impl UpdateMTextCommand {
    fn run(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<LabelOutcome, EngineError> {
        let text_id = entity_arg(&request.args, 0, "mtext")?;
        let feature_id = entity_arg(&request.args, 1, "feature")?;
        let settings = context.settings;
        let lookups = context.lookups;

        let mut tx = context.document.transaction();
        let middle = match require_entity(tx.document(), text_id)? {
            Entity::MText(mtext) => mtext.plain_text(),
            other => return Err(unexpected(text_id, "mtext", other)),
        };
        require_entity(tx.document(), feature_id)?;

        let Some(fields) = read_label_fields(
            &self.reader,
            tx.document(),
            feature_id,
            lookups,
            &settings.fields,
        ) else {
            tx.abort();
            return Ok(LabelOutcome::NothingToAnnotate {
                feature: feature_id,
            });
        };

        let text = assemble(
            &fields,
            AssemblyMode::FreeLabel {
                middle: Some(&middle),
            },
        )
        .render();
        write_mtext_label(&mut tx, text_id, &text)?;
        tx.commit();

        Ok(LabelOutcome::Applied {
            target: text_id,
            text,
            echo_text: false,
        })
    }
}

impl CommandHandler for UpdateMTextCommand {
    fn name(&self) -> &'static str {
        "UPM"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = self.run(request, context);
        finish(self.name(), result, context.journal)
    }
}

/// UPC：在指定位置新建多行文字标签，图层沿用被标注对象。
#[derive(Default)]
pub struct CreateMTextCommand {
    reader: AttributeRecordReader,
}

impl CreateMTextCommand {
    fn run(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> Result<LabelOutcome, EngineError> {
        let feature_id = entity_arg(&request.args, 0, "feature")?;
        let x = coordinate_arg(&request.args, 1, "x")?
            .ok_or_else(|| EngineError::InvalidArgument("missing x coordinate".to_string()))?;
        let y = coordinate_arg(&request.args, 2, "y")?
            .ok_or_else(|| EngineError::InvalidArgument("missing y coordinate".to_string()))?;
        let z = coordinate_arg(&request.args, 3, "z")?.unwrap_or(0.0);
        let settings = context.settings;
        let lookups = context.lookups;

        let mut tx = context.document.transaction();
        let layer = require_entity(tx.document(), feature_id)?
            .layer_name()
            .to_string();

        let Some(fields) = read_label_fields(
            &self.reader,
            tx.document(),
            feature_id,
            lookups,
            &settings.fields,
        ) else {
            tx.abort();
            return Ok(LabelOutcome::NothingToAnnotate {
                feature: feature_id,
            });
        };

        let text = assemble(&fields, AssemblyMode::FreeLabel { middle: None }).render();
        let height = LabelPlacer::new(settings.fallback_text_height).fallback_height();
        tx.create(Entity::MText(MText {
            location: Point3::new(x, y, z),
            contents: text.clone(),
            height,
            style: None,
            layer,
        }));
        let summary = tx.commit();
        let Some(&created) = summary.created.first() else {
            return Err(EngineError::InvalidArgument(
                "label entity was not created".to_string(),
            ));
        };

        Ok(LabelOutcome::Applied {
            target: created,
            text,
            echo_text: false,
        })
    }
}

impl CommandHandler for CreateMTextCommand {
    fn name(&self) -> &'static str {
        "UPC"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let result = self.run(request, context);
        finish(self.name(), result, context.journal)
    }
}
