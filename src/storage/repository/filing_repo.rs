use crate::model::Cik;
use crate::storage::entity::filing::{self, Entity as Filing};
use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder};

pub struct FilingRepository;

impl FilingRepository {
    /// after < filing_date <= until
    pub async fn filings_between<C: ConnectionTrait>(
        db: &C,
        after: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<filing::Model>, sea_orm::DbErr> {
        Filing::find()
            .filter(filing::Column::FilingDate.gt(after))
            .filter(filing::Column::FilingDate.lte(until))
            .order_by_asc(filing::Column::Cik)
            .order_by_asc(filing::Column::FilingDate)
            .order_by_asc(filing::Column::AccessionNumber)
            .all(db)
            .await
    }

    pub async fn for_company<C: ConnectionTrait>(
        db: &C,
        cik: Cik,
    ) -> Result<Vec<filing::Model>, sea_orm::DbErr> {
        Filing::find()
            .filter(filing::Column::Cik.eq(cik))
            .order_by_asc(filing::Column::FilingDate)
            .all(db)
            .await
    }

    /// 同一 accession 重复写入时只刷新 items
    pub async fn upsert_many<C: ConnectionTrait>(
        db: &C,
        filings: Vec<filing::Model>,
    ) -> Result<u64, sea_orm::DbErr> {
        let mut written = 0u64;
        for chunk in filings.chunks(500) {
            let models = chunk.iter().cloned().map(|m| m.into_active_model());
            written += Filing::insert_many(models)
                .on_conflict(
                    OnConflict::columns([filing::Column::Cik, filing::Column::AccessionNumber])
                        .update_column(filing::Column::Items)
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
        Ok(written)
    }
}
