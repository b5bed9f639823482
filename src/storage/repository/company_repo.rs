use crate::model::Cik;
use crate::storage::entity::company::{self, Entity as Company};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder};
use std::collections::{BTreeSet, HashMap};

pub struct CompanyRepository;

impl CompanyRepository {
    pub async fn all<C: ConnectionTrait>(db: &C) -> Result<Vec<company::Model>, sea_orm::DbErr> {
        Company::find()
            .order_by_asc(company::Column::Cik)
            .all(db)
            .await
    }

    pub async fn all_ciks<C: ConnectionTrait>(db: &C) -> Result<BTreeSet<Cik>, sea_orm::DbErr> {
        let rows = Self::all(db).await?;
        Ok(rows.into_iter().map(|c| c.cik).collect())
    }

    pub async fn titles_for<C: ConnectionTrait>(
        db: &C,
        ciks: &[Cik],
    ) -> Result<HashMap<Cik, String>, sea_orm::DbErr> {
        if ciks.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = Company::find()
            .filter(company::Column::Cik.is_in(ciks.to_vec()))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|c| (c.cik, c.title)).collect())
    }

    /// 按 cik 覆盖 title/ticker
    pub async fn upsert_many<C: ConnectionTrait>(
        db: &C,
        companies: Vec<company::Model>,
    ) -> Result<u64, sea_orm::DbErr> {
        let mut written = 0u64;
        for chunk in companies.chunks(500) {
            let models = chunk.iter().cloned().map(|m| m.into_active_model());
            written += Company::insert_many(models)
                .on_conflict(
                    OnConflict::column(company::Column::Cik)
                        .update_columns([company::Column::Title, company::Column::Ticker])
                        .to_owned(),
                )
                .exec_without_returning(db)
                .await?;
        }
        Ok(written)
    }
}
