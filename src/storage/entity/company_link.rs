use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 新闻记录 -> 公司 的关联，三元组主键保证集合语义
#[derive(Clone, Debug, PartialEq, Eq, Hash, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "company_links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub time_bucket: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub record_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub cik: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
