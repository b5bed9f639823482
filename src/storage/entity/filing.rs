use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "company_filings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cik: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub accession_number: String,
    pub form: String,
    pub filing_date: Date,
    pub primary_document: String,
    #[sea_orm(nullable)]
    pub items: Option<String>, // e.g. "2.01,9.01"
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
