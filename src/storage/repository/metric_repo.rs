use crate::storage::entity::run_metric::{self, Entity as RunMetric};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder};

pub struct MetricRepository;

impl MetricRepository {
    /// 按 (run_id, k) 覆盖
    pub async fn upsert_many<C: ConnectionTrait>(
        db: &C,
        rows: Vec<run_metric::Model>,
    ) -> Result<u64, sea_orm::DbErr> {
        if rows.is_empty() {
            return Ok(0);
        }
        let models = rows.into_iter().map(|m| m.into_active_model());
        RunMetric::insert_many(models)
            .on_conflict(
                OnConflict::columns([run_metric::Column::RunId, run_metric::Column::K])
                    .update_columns([
                        run_metric::Column::TopCiks,
                        run_metric::Column::TopScores,
                        run_metric::Column::PositivesInTop,
                        run_metric::Column::TotalPositives,
                        run_metric::Column::Recall,
                        run_metric::Column::Precision,
                        run_metric::Column::ComputedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await
    }

    pub async fn metrics_for_run<C: ConnectionTrait>(
        db: &C,
        run_id: i32,
    ) -> Result<Vec<run_metric::Model>, sea_orm::DbErr> {
        RunMetric::find()
            .filter(run_metric::Column::RunId.eq(run_id))
            .order_by_asc(run_metric::Column::K)
            .all(db)
            .await
    }
}
