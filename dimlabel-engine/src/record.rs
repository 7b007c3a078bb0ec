use dimlabel_core::document::{Document, EntityId};
use dimlabel_core::object_data::{ObjectDataRecord, ObjectDataTable};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("call shape `{0}` is not supported by this attribute store")]
    UnsupportedCallShape(&'static str),
    #[error("feature {0} is not present in the attribute store")]
    FeatureNotFound(u64),
    #[error("object data table index {0} is out of range")]
    TableIndexOutOfRange(usize),
    #[error("attribute store failure: {0}")]
    Backend(String),
}

/// 宿主的属性数据接口，存在两种调用形式，不同版本的宿主可能只支持其一。
pub trait AttributeStore {
    /// 按实体查询其在全部表中的记录。
    fn object_records(&self, feature: EntityId) -> Result<Vec<ObjectDataRecord>, StoreError>;

    /// 附带表序号的查询形式。
    fn indexed_records(
        &self,
        table_index: usize,
        feature: EntityId,
    ) -> Result<Vec<ObjectDataRecord>, StoreError>;

    fn table(&self, name: &str) -> Option<&ObjectDataTable>;
}

/// 记录检索策略，按顺序尝试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    ObjectRecords,
    IndexedRecords { table_index: usize },
}

pub const DEFAULT_STRATEGIES: [RetrievalStrategy; 2] = [
    RetrievalStrategy::ObjectRecords,
    RetrievalStrategy::IndexedRecords { table_index: 0 },
];

#[derive(Debug)]
pub enum RetrievalOutcome {
    Records(Vec<ObjectDataRecord>),
    Unsupported(StoreError),
}

impl RetrievalStrategy {
    pub fn call_shape(&self) -> &'static str {
        match self {
            RetrievalStrategy::ObjectRecords => "object_records(feature)",
            RetrievalStrategy::IndexedRecords { .. } => "indexed_records(table, feature)",
        }
    }

    pub fn attempt(&self, store: &dyn AttributeStore, feature: EntityId) -> RetrievalOutcome {
        let result = match *self {
            RetrievalStrategy::ObjectRecords => store.object_records(feature),
            RetrievalStrategy::IndexedRecords { table_index } => {
                store.indexed_records(table_index, feature)
            }
        };
        match result {
            Ok(records) => RetrievalOutcome::Records(records),
            Err(err) => RetrievalOutcome::Unsupported(err),
        }
    }
}

/// 单条属性记录：字段名到字符串值，保持表定义中的字段顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRecord {
    table: String,
    fields: Vec<(String, String)>,
}

impl AttributeRecord {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// 同名字段后写覆盖先写。
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// 字段缺失时返回空串。
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AttributeRecordReader {
    strategies: Vec<RetrievalStrategy>,
}

impl Default for AttributeRecordReader {
    fn default() -> Self {
        Self::new(DEFAULT_STRATEGIES.to_vec())
    }
}

impl AttributeRecordReader {
    pub fn new(strategies: Vec<RetrievalStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[RetrievalStrategy] {
        &self.strategies
    }

    /// 读取实体的第一条属性记录。
    ///
    /// 第一个成功的策略决定结果；全部策略失败、结果为空或记录所属表缺失时返回 `None`。
    pub fn read_first_record(
        &self,
        store: &dyn AttributeStore,
        feature: EntityId,
    ) -> Option<AttributeRecord> {
        let mut found = None;
        for strategy in &self.strategies {
            match strategy.attempt(store, feature) {
                RetrievalOutcome::Records(records) => {
                    found = Some(records);
                    break;
                }
                RetrievalOutcome::Unsupported(err) => {
                    debug!(
                        feature = feature.get(),
                        shape = strategy.call_shape(),
                        error = %err,
                        "属性检索失败，尝试下一种调用形式"
                    );
                }
            }
        }

        let Some(records) = found else {
            warn!(feature = feature.get(), "所有属性检索方式均失败");
            return None;
        };
        let first = records.into_iter().next()?;
        let Some(table) = store.table(&first.table) else {
            warn!(feature = feature.get(), table = %first.table, "记录引用的属性表不存在");
            return None;
        };

        let mut record = AttributeRecord::new(table.name.clone());
        for (index, definition) in table.fields.iter().enumerate() {
            if let Some(value) = first.values.get(index) {
                record.insert(definition.name.clone(), value.str_value());
            }
        }
        debug!(
            feature = feature.get(),
            table = %record.table(),
            fields = record.len(),
            "已读取属性记录"
        );
        Some(record)
    }
}

impl AttributeStore for Document {
    fn object_records(&self, feature: EntityId) -> Result<Vec<ObjectDataRecord>, StoreError> {
        if self.entity(feature).is_none() {
            return Err(StoreError::FeatureNotFound(feature.get()));
        }
        Ok(self.object_data().records_for(feature).cloned().collect())
    }

    fn indexed_records(
        &self,
        table_index: usize,
        feature: EntityId,
    ) -> Result<Vec<ObjectDataRecord>, StoreError> {
        if self.entity(feature).is_none() {
            return Err(StoreError::FeatureNotFound(feature.get()));
        }
        let table = self
            .object_data()
            .table_at(table_index)
            .ok_or(StoreError::TableIndexOutOfRange(table_index))?;
        Ok(self
            .object_data()
            .records_for(feature)
            .filter(|record| record.table == table.name)
            .cloned()
            .collect())
    }

    fn table(&self, name: &str) -> Option<&ObjectDataTable> {
        self.object_data().table(name)
    }
}
