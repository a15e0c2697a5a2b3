use std::{collections::HashMap, sync::Arc};

use log::{info, warn};

use crate::{
    database::{ComplaintStore, UserStore},
    error::{ApiError, StoreError},
    models::{
        Complaint, ComplaintCategory, ComplaintPage, ComplaintStats, ComplaintStatus,
        ComplaintView, NewComplaint, StatusCounts, User,
    },
    storage::BlobStore,
    ticket,
    validation::{validate_submission, ComplaintSubmission, ImageUpload, ListQuery, StatusUpdate},
};

pub const PAGE_SIZE: i64 = 10;
const TICKET_ATTEMPTS: usize = 5;
const IMAGE_DIRECTORY: &str = "complaints";

/// Owns the complaint lifecycle: submission, lookup, triage and removal.
#[derive(Clone)]
pub struct ComplaintRegistry {
    complaints: Arc<dyn ComplaintStore>,
    users: Arc<dyn UserStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ComplaintRegistry {
    pub fn new(
        complaints: Arc<dyn ComplaintStore>,
        users: Arc<dyn UserStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            complaints,
            users,
            blobs,
        }
    }

    pub async fn create(
        &self,
        submission: ComplaintSubmission,
        image: Option<ImageUpload>,
        submitter: Option<i64>,
    ) -> Result<ComplaintView, ApiError> {
        let (details, image) =
            validate_submission(submission, image).map_err(ApiError::Validation)?;

        let image_path = match image {
            Some(image) => Some(
                self.blobs
                    .put(IMAGE_DIRECTORY, image.format.extension(), image.bytes)
                    .await?,
            ),
            None => None,
        };

        let mut complaint = NewComplaint {
            ticket_number: String::new(),
            user_id: submitter,
            name: details.name,
            email: details.email,
            phone: details.phone,
            address: details.address,
            category: details.category,
            description: details.description,
            image_path,
        };

        match self.insert_with_fresh_ticket(&mut complaint).await {
            Ok(created) => {
                info!("Complaint {} created", created.ticket_number);
                self.present(created).await
            }
            Err(err) => {
                if let Some(path) = &complaint.image_path {
                    self.discard_blob(path).await;
                }
                Err(err.into())
            }
        }
    }

    async fn insert_with_fresh_ticket(
        &self,
        complaint: &mut NewComplaint,
    ) -> Result<Complaint, StoreError> {
        for attempt in 1..=TICKET_ATTEMPTS {
            complaint.ticket_number = ticket::generate_ticket_number();
            match self.complaints.insert(complaint).await {
                Err(StoreError::Conflict) => warn!(
                    "Ticket number {} already taken (attempt {attempt}/{TICKET_ATTEMPTS})",
                    complaint.ticket_number
                ),
                result => return result,
            }
        }

        Err(StoreError::Conflict)
    }

    /// Lookup by public ticket number. Input is trimmed and uppercased first.
    pub async fn find_by_ticket(&self, ticket_number: &str) -> Result<ComplaintView, ApiError> {
        let ticket_number = ticket::normalize(ticket_number);
        if !ticket::is_well_formed(&ticket_number) {
            return Err(ApiError::complaint_not_found());
        }

        match self.complaints.find_by_ticket(&ticket_number).await? {
            Some(complaint) => self.present(complaint).await,
            None => Err(ApiError::complaint_not_found()),
        }
    }

    pub async fn get(&self, id: i64) -> Result<ComplaintView, ApiError> {
        match self.complaints.find(id).await? {
            Some(complaint) => self.present(complaint).await,
            None => Err(ApiError::complaint_not_found()),
        }
    }

    pub async fn list(&self, query: ListQuery) -> Result<ComplaintPage, ApiError> {
        let (filter, page) = query.into_filter().map_err(ApiError::Validation)?;
        let offset = (page - 1).saturating_mul(PAGE_SIZE);

        let (complaints, total) = self.complaints.list(&filter, offset, PAGE_SIZE).await?;

        Ok(ComplaintPage {
            current_page: page,
            data: self.present_all(complaints).await?,
            per_page: PAGE_SIZE,
            total,
            last_page: ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1),
        })
    }

    pub async fn update(&self, id: i64, update: StatusUpdate) -> Result<ComplaintView, ApiError> {
        let change = update.validated().map_err(ApiError::Validation)?;

        match self.complaints.update_status(id, &change).await? {
            Some(complaint) => {
                info!(
                    "Complaint {} set to {}",
                    complaint.ticket_number, complaint.status
                );
                self.present(complaint).await
            }
            None => Err(ApiError::complaint_not_found()),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let complaint = self
            .complaints
            .find(id)
            .await?
            .ok_or_else(ApiError::complaint_not_found)?;

        if let Some(path) = &complaint.image_path {
            self.discard_blob(path).await;
        }

        if !self.complaints.delete(id).await? {
            return Err(ApiError::complaint_not_found());
        }

        info!("Complaint {} deleted", complaint.ticket_number);
        Ok(())
    }

    pub async fn stats(&self) -> Result<ComplaintStats, ApiError> {
        let mut stats = StatusCounts::default();
        for (status, count) in self.complaints.count_by_status().await? {
            stats.total += count;
            match status {
                ComplaintStatus::Pending => stats.pending += count,
                ComplaintStatus::InProgress => stats.in_progress += count,
                ComplaintStatus::Completed => stats.completed += count,
                ComplaintStatus::Rejected => stats.rejected += count,
            }
        }

        let mut by_category: HashMap<ComplaintCategory, i64> =
            self.complaints.count_by_category().await?.into_iter().collect();
        let by_category = ComplaintCategory::ALL
            .into_iter()
            .map(|category| {
                let count = by_category.remove(&category).unwrap_or(0);
                (category.as_str().to_owned(), count)
            })
            .collect();

        Ok(ComplaintStats { stats, by_category })
    }

    async fn discard_blob(&self, path: &str) {
        if let Err(err) = self.blobs.delete(path).await {
            warn!("Failed to delete stored image {path}: {err}");
        }
    }

    async fn present(&self, complaint: Complaint) -> Result<ComplaintView, ApiError> {
        let mut views = self.present_all(vec![complaint]).await?;
        views
            .pop()
            .ok_or_else(|| ApiError::Internal("complaint vanished while resolving".to_owned()))
    }

    /// Attaches image URLs and resolves submitters in a single user lookup.
    async fn present_all(&self, complaints: Vec<Complaint>) -> Result<Vec<ComplaintView>, ApiError> {
        let mut user_ids: Vec<i64> = complaints.iter().filter_map(|c| c.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users: HashMap<i64, User> = self
            .users
            .find_many(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(complaints
            .into_iter()
            .map(|complaint| {
                let image_url = complaint.image_path.as_deref().map(|path| self.blobs.url(path));
                let user = complaint.user_id.and_then(|id| users.get(&id).cloned());
                ComplaintView::new(complaint, image_url, user)
            })
            .collect())
    }
}
