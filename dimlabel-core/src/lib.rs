pub mod geometry {
    use std::ops::{Mul, Neg};

    use glam::DVec3;
    use serde::{Deserialize, Serialize};

    /// 三维点，内部以 `glam::DVec3` 表示，与宿主图形库的双精度坐标保持一致。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point3) -> Vector3 {
            Vector3(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，提供标注定位所需的叉积与归一化。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const Z: Vector3 = Vector3(DVec3::Z);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn from_points(start: Point3, end: Point3) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        /// 长度接近零时返回 `None`，调用方需自行处理退化几何。
        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        #[inline]
        pub fn dot(self, other: Vector3) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn cross(self, other: Vector3) -> Vector3 {
            Self(self.0.cross(other.0))
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    impl Mul<f64> for Vector3 {
        type Output = Vector3;

        fn mul(self, rhs: f64) -> Self::Output {
            Self(self.0 * rhs)
        }
    }

    impl Neg for Vector3 {
        type Output = Vector3;

        fn neg(self) -> Self::Output {
            Self(-self.0)
        }
    }
}

pub mod object_data {
    use serde::{Deserialize, Serialize};

    use crate::document::EntityId;
    use crate::geometry::Point3;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum FieldKind {
        Integer,
        Real,
        Character,
        Point,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FieldDefinition {
        pub name: String,
        pub kind: FieldKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
    }

    impl FieldDefinition {
        pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
            Self {
                name: name.into(),
                kind,
                description: None,
            }
        }
    }

    /// 属性数据表定义，字段顺序即记录中值的顺序。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ObjectDataTable {
        pub name: String,
        pub fields: Vec<FieldDefinition>,
    }

    impl ObjectDataTable {
        pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
            Self {
                name: name.into(),
                fields,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(untagged)]
    pub enum FieldValue {
        Integer(i64),
        Real(f64),
        Text(String),
        Point(Point3),
    }

    impl FieldValue {
        /// 与宿主 `StrValue` 一致的字符串呈现。
        pub fn str_value(&self) -> String {
            match self {
                FieldValue::Integer(value) => value.to_string(),
                FieldValue::Real(value) => value.to_string(),
                FieldValue::Text(value) => value.clone(),
                FieldValue::Point(point) => {
                    format!("{},{},{}", point.x(), point.y(), point.z())
                }
            }
        }
    }

    impl From<&str> for FieldValue {
        fn from(value: &str) -> Self {
            FieldValue::Text(value.to_string())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ObjectDataRecord {
        pub table: String,
        pub values: Vec<FieldValue>,
    }

    impl ObjectDataRecord {
        pub fn new(table: impl Into<String>, values: Vec<FieldValue>) -> Self {
            Self {
                table: table.into(),
                values,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AttachedRecord {
        pub owner: EntityId,
        pub record: ObjectDataRecord,
    }

    /// 文档内的属性数据存储：表定义有序，记录按挂接顺序保存。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct ObjectDataStore {
        #[serde(default)]
        tables: Vec<ObjectDataTable>,
        #[serde(default)]
        records: Vec<AttachedRecord>,
    }

    impl ObjectDataStore {
        /// 新增表定义；同名表已存在时保留旧定义并返回 `false`。
        pub fn add_table(&mut self, table: ObjectDataTable) -> bool {
            if self.table(&table.name).is_some() {
                return false;
            }
            self.tables.push(table);
            true
        }

        pub fn table(&self, name: &str) -> Option<&ObjectDataTable> {
            self.tables.iter().find(|table| table.name == name)
        }

        pub fn table_at(&self, index: usize) -> Option<&ObjectDataTable> {
            self.tables.get(index)
        }

        pub fn tables(&self) -> impl Iterator<Item = &ObjectDataTable> {
            self.tables.iter()
        }

        pub fn attach(&mut self, owner: EntityId, record: ObjectDataRecord) {
            self.records.push(AttachedRecord { owner, record });
        }

        /// 按挂接顺序返回实体上的全部记录。
        pub fn records_for(&self, owner: EntityId) -> impl Iterator<Item = &ObjectDataRecord> {
            self.records
                .iter()
                .filter(move |attached| attached.owner == owner)
                .map(|attached| &attached.record)
        }

        pub fn record_count(&self) -> usize {
            self.records.len()
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point3, Vector3};
    use crate::object_data::ObjectDataStore;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl std::fmt::Display for EntityId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum Entity {
        Polyline(Polyline),
        AlignedDimension(AlignedDimension),
        MText(MText),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::AlignedDimension(dimension) => &dimension.layer,
                Entity::MText(mtext) => &mtext.layer,
            }
        }

        #[inline]
        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Polyline(_) => "polyline",
                Entity::AlignedDimension(_) => "aligned dimension",
                Entity::MText(_) => "mtext",
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point3>,
        #[serde(default)]
        pub is_closed: bool,
        pub layer: String,
    }

    /// 对齐标注。`text` 为空表示使用测量值，否则为用户覆盖文字（可能含控制码）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AlignedDimension {
        pub x_line1: Point3,
        pub x_line2: Point3,
        pub dimension_line_point: Point3,
        pub text_position: Point3,
        #[serde(default = "default_normal")]
        pub normal: Vector3,
        pub measurement: f64,
        #[serde(default)]
        pub text: String,
        pub style: String,
        pub layer: String,
    }

    fn default_normal() -> Vector3 {
        Vector3::Z
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub location: Point3,
        pub contents: String,
        pub height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub style: Option<String>,
        pub layer: String,
    }

    impl MText {
        /// 去除格式控制码后的纯文本，`\P`/`\X` 视为换行。
        pub fn plain_text(&self) -> String {
            strip_mtext_codes(&self.contents)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DimStyle {
        pub name: String,
        pub text_height: f64,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        #[serde(default)]
        dim_styles: Vec<DimStyle>,
        #[serde(default)]
        object_data: ObjectDataStore,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point3>,
        {
            self.add_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_aligned_dimension(&mut self, dimension: AlignedDimension) -> EntityId {
            self.add_entity(Entity::AlignedDimension(dimension))
        }

        pub fn add_mtext(
            &mut self,
            location: Point3,
            contents: impl Into<String>,
            height: f64,
            style: Option<String>,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::MText(MText {
                location,
                contents: contents.into(),
                height,
                style,
                layer: layer.into(),
            }))
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|(entity_id, _)| *entity_id == id)
                .map(|(_, entity)| entity)
        }

        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        /// 同名样式存在时覆盖其字高。
        pub fn add_dim_style(&mut self, name: impl Into<String>, text_height: f64) {
            let name = name.into();
            if let Some(style) = self.dim_styles.iter_mut().find(|s| s.name == name) {
                style.text_height = text_height;
            } else {
                self.dim_styles.push(DimStyle { name, text_height });
            }
        }

        pub fn dim_style(&self, name: &str) -> Option<&DimStyle> {
            self.dim_styles.iter().find(|style| style.name == name)
        }

        #[inline]
        pub fn object_data(&self) -> &ObjectDataStore {
            &self.object_data
        }

        #[inline]
        pub fn object_data_mut(&mut self) -> &mut ObjectDataStore {
            &mut self.object_data
        }

        /// 开启编辑事务；事务在 `commit` 前不会改动文档。
        pub fn transaction(&mut self) -> Transaction<'_> {
            Transaction {
                document: self,
                opened: Vec::new(),
                created: Vec::new(),
            }
        }

        fn replace_entity(&mut self, id: EntityId, entity: Entity) -> bool {
            match self.entities.iter_mut().find(|(entity_id, _)| *entity_id == id) {
                Some(slot) => {
                    slot.1 = entity;
                    true
                }
                None => false,
            }
        }

        /// 快照中的计数器可能落后于已有实体，分配前先越过最大的已用 id。
        fn next_id(&mut self) -> EntityId {
            if let Some(max) = self.entities.iter().map(|(id, _)| id.get()).max() {
                self.next_entity_id = self.next_entity_id.max(max + 1);
            }
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            id
        }
    }

    /// 事务提交结果。
    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    pub struct CommitSummary {
        pub modified: Vec<EntityId>,
        pub created: Vec<EntityId>,
    }

    /// 编辑事务：写打开的实体在副本上修改，提交时整体写回；直接丢弃即视为中止。
    #[derive(Debug)]
    pub struct Transaction<'a> {
        document: &'a mut Document,
        opened: Vec<(EntityId, Entity)>,
        created: Vec<Entity>,
    }

    impl<'a> Transaction<'a> {
        /// 只读访问事务开始前的文档状态。
        #[inline]
        pub fn document(&self) -> &Document {
            &*self.document
        }

        pub fn open_for_write(&mut self, id: EntityId) -> Option<&mut Entity> {
            if let Some(index) = self.opened.iter().position(|(opened, _)| *opened == id) {
                return Some(&mut self.opened[index].1);
            }
            let copy = self.document.entity(id)?.clone();
            self.opened.push((id, copy));
            self.opened.last_mut().map(|(_, entity)| entity)
        }

        pub fn create(&mut self, entity: Entity) {
            self.created.push(entity);
        }

        pub fn is_empty(&self) -> bool {
            self.opened.is_empty() && self.created.is_empty()
        }

        pub fn commit(self) -> CommitSummary {
            let Transaction {
                document,
                opened,
                created,
            } = self;
            let mut summary = CommitSummary::default();
            for (id, entity) in opened {
                if document.replace_entity(id, entity) {
                    summary.modified.push(id);
                }
            }
            for entity in created {
                summary.created.push(document.add_entity(entity));
            }
            summary
        }

        pub fn abort(self) {}
    }

    fn strip_mtext_codes(raw: &str) -> String {
        let mut result = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' | '}' => {}
                '\\' => match chars.next() {
                    Some('P') | Some('p') | Some('X') => result.push('\n'),
                    Some('~') => result.push(' '),
                    Some(escaped @ ('\\' | '{' | '}')) => result.push(escaped),
                    Some('L' | 'l' | 'O' | 'o' | 'K' | 'k') => {}
                    // `\U+XXXX` 为 Unicode 字符，`\M+NXXXX` 为多字节代码页字符，均无 `;` 结尾。
                    Some(code @ ('U' | 'M')) if chars.peek() == Some(&'+') => {
                        chars.next();
                        let width = if code == 'U' { 4 } else { 5 };
                        let mut hex = String::with_capacity(width);
                        while hex.len() < width {
                            match chars.peek() {
                                Some(digit) if digit.is_ascii_hexdigit() => {
                                    hex.push(*digit);
                                    chars.next();
                                }
                                _ => break,
                            }
                        }
                        if code == 'U' {
                            if let Some(decoded) =
                                u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
                            {
                                result.push(decoded);
                            }
                        }
                    }
                    // 其余属性码（字体、高度、颜色等）以 `;` 结束。
                    Some(_) => {
                        for next in chars.by_ref() {
                            if next == ';' {
                                break;
                            }
                        }
                    }
                    None => result.push('\\'),
                },
                other => result.push(other),
            }
        }
        result
    }

}

#[cfg(test)]
mod tests {
    use super::document::{Document, EntityId};
    use super::geometry::{Point3, Vector3};
    use super::object_data::{
        FieldDefinition, FieldKind, FieldValue, ObjectDataRecord, ObjectDataTable,
    };

    #[test]
    fn vector_cross_and_normalize() {
        let x = Vector3::from_points(Point3::new(1.0, 1.0, 0.0), Point3::new(4.0, 1.0, 0.0));
        let unit = x.normalize().expect("non-degenerate");
        assert!((unit.length() - 1.0).abs() < 1e-12);

        let perp = unit.cross(Vector3::Z).normalize().expect("perpendicular");
        assert!((perp.x()).abs() < 1e-12);
        assert!((perp.y() + 1.0).abs() < 1e-12);

        assert!(Vector3::new(0.0, 0.0, 0.0).normalize().is_none());
        let moved = Point3::new(0.0, 0.0, 0.0).translate(-(perp * 2.0));
        assert!((moved.y() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn field_values_render_as_strings() {
        assert_eq!(FieldValue::Integer(42).str_value(), "42");
        assert_eq!(FieldValue::Real(12.5).str_value(), "12.5");
        assert_eq!(FieldValue::from("LOC1").str_value(), "LOC1");
        assert_eq!(
            FieldValue::Point(Point3::new(1.0, 2.5, 0.0)).str_value(),
            "1,2.5,0"
        );
    }

    #[test]
    fn object_data_records_keep_attachment_order() {
        let mut doc = Document::new();
        let store = doc.object_data_mut();
        assert!(store.add_table(ObjectDataTable::new(
            "PIPES",
            vec![FieldDefinition::new("COMPANY", FieldKind::Character)],
        )));
        assert!(!store.add_table(ObjectDataTable::new("PIPES", Vec::new())));

        let owner = EntityId::new(3);
        store.attach(owner, ObjectDataRecord::new("PIPES", vec!["first".into()]));
        store.attach(EntityId::new(4), ObjectDataRecord::new("PIPES", vec!["other".into()]));
        store.attach(owner, ObjectDataRecord::new("PIPES", vec!["second".into()]));

        let values: Vec<String> = doc
            .object_data()
            .records_for(owner)
            .map(|record| record.values[0].str_value())
            .collect();
        assert_eq!(values, vec!["first", "second"]);
        assert_eq!(doc.object_data().record_count(), 3);
        assert_eq!(
            doc.object_data().table("PIPES").map(|t| t.fields.len()),
            Some(1)
        );
        assert!(doc.object_data().table_at(1).is_none());
    }
}
