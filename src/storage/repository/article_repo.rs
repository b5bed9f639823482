use crate::storage::entity::article_text::{self, Entity as CachedArticle};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, EntityTrait, IntoActiveModel};

pub struct ArticleRepository;

impl ArticleRepository {
    pub async fn find<C: ConnectionTrait>(
        db: &C,
        url: &str,
    ) -> Result<Option<article_text::Model>, sea_orm::DbErr> {
        CachedArticle::find_by_id(url.to_string()).one(db).await
    }

    /// 按 URL 覆盖：成功抓取会清掉旧的 fetch_error，失败会清掉旧文本
    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        row: article_text::Model,
    ) -> Result<(), sea_orm::DbErr> {
        CachedArticle::insert(row.into_active_model())
            .on_conflict(
                OnConflict::column(article_text::Column::ArticleUrl)
                    .update_columns([
                        article_text::Column::Title,
                        article_text::Column::Snippet,
                        article_text::Column::LastFetchedAt,
                        article_text::Column::FetchError,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        Ok(())
    }
}
