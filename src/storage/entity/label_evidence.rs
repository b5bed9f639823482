use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 正例的触发依据：哪份 8-K、哪个 item code
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "experiment_label_evidence")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub experiment_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub cik: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub accession_number: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub item_code: String,
    pub filing_date: Date,
    pub primary_document: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::experiment::Entity",
        from = "Column::ExperimentId",
        to = "super::experiment::Column::Id",
        on_delete = "Cascade"
    )]
    Experiment,
}

impl ActiveModelBehavior for ActiveModel {}
