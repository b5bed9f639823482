use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_scores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub run_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub cik: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub record_id: String,
    pub experiment_id: i32,
    pub time_bucket: String,
    pub article_url: String,
    #[sea_orm(nullable)]
    pub article_title: Option<String>,
    pub score: i32,
    pub reason: String,
    #[sea_orm(nullable)]
    pub label: Option<i32>,
    pub evaluated_at: i64,
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

impl Related<super::scoring_run::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScoringRun.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
