use estate_domain::{Notification, Workspace};
use uuid::Uuid;

use crate::{property_service::required, time::Clock, CoreError, ServiceResult};

/// In-app notifications; unread counts are computed on read.
pub struct NotificationService;

impl NotificationService {
    pub fn notify(
        ws: &mut Workspace,
        user_id: Uuid,
        title: &str,
        message: &str,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        if ws.user(user_id).is_none() {
            return Err(CoreError::not_found("User", user_id));
        }
        let notification = Notification::new(
            user_id,
            required("Title", title)?,
            message.trim(),
            clock.now(),
        );
        let id = notification.id;
        ws.notifications.push(notification);
        ws.touch();
        Ok(id)
    }

    /// Newest first.
    pub fn list_for(ws: &Workspace, user_id: Uuid) -> Vec<&Notification> {
        let mut items: Vec<_> = ws
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    pub fn unread_count(ws: &Workspace, user_id: Uuid) -> usize {
        ws.notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    pub fn mark_read(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        let notification = ws
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::not_found("Notification", id))?;
        notification.read = true;
        ws.touch();
        Ok(())
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(ws: &mut Workspace, user_id: Uuid) -> usize {
        let mut changed = 0;
        for notification in ws
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            notification.read = true;
            changed += 1;
        }
        if changed > 0 {
            ws.touch();
        }
        changed
    }

    pub fn remove(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        let before = ws.notifications.len();
        ws.notifications.retain(|n| n.id != id);
        if ws.notifications.len() == before {
            return Err(CoreError::not_found("Notification", id));
        }
        ws.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{access_service::AccessService, time::FixedClock};
    use chrono::{Duration, NaiveDate};

    #[test]
    fn unread_count_tracks_reads() {
        let mut ws = Workspace::new("Notify");
        let role = ws.role_by_name("Agent").unwrap().id;
        let start = FixedClock::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let user = AccessService::register_user(&mut ws, "Ann", "ann@example.com", "secret1", role, &start).unwrap();

        let first = NotificationService::notify(&mut ws, user, "Rent due", "INV-0001", &start).unwrap();
        let later = FixedClock(start.0 + Duration::hours(1));
        NotificationService::notify(&mut ws, user, "Lease expiring", "", &later).unwrap();
        assert!(NotificationService::notify(&mut ws, Uuid::new_v4(), "x", "", &start).is_err());

        assert_eq!(NotificationService::list_for(&ws, user)[0].title, "Lease expiring");
        assert_eq!(NotificationService::unread_count(&ws, user), 2);
        NotificationService::mark_read(&mut ws, first).unwrap();
        assert_eq!(NotificationService::unread_count(&ws, user), 1);
        assert_eq!(NotificationService::mark_all_read(&mut ws, user), 1);
        assert_eq!(NotificationService::unread_count(&ws, user), 0);
        NotificationService::remove(&mut ws, first).unwrap();
        assert!(NotificationService::remove(&mut ws, first).is_err());
    }
}
