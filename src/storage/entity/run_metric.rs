use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "run_metrics")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub k: i32,
    // JSON 数组，按排名顺序
    pub top_ciks: String,
    pub top_scores: String,
    pub positives_in_top: i32,
    pub total_positives: i32,
    pub recall: f64,
    pub precision: f64,
    pub computed_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scoring_run::Entity",
        from = "Column::RunId",
        to = "super::scoring_run::Column::Id",
        on_delete = "Cascade"
    )]
    ScoringRun,
}

impl ActiveModelBehavior for ActiveModel {}
