// ==========================================
// 共享设备预约系统 - 通知扇出
// ==========================================
// 约束: 尽力而为；失败计数 + warn 记录，绝不回滚已提交的业务写入
// ==========================================

use crate::config::NotificationSettings;
use crate::engine::collaborators::NotificationSender;
use tracing::warn;

/// 单次扇出的投递结果
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutResult {
    pub notified: u64,
    pub failed: u64,
}

/// 向预约人（按开关）及角色/额外收件人投递同一条消息
///
/// 预约人投递与角色投递相互独立，任一失败不影响其余收件人。
pub async fn fan_out<N: NotificationSender + ?Sized>(
    notifier: &N,
    settings: &NotificationSettings,
    requester_email: &str,
    requester_name: &str,
    subject: &str,
    body_lines: &[String],
) -> FanOutResult {
    let mut result = FanOutResult::default();

    if settings.notify_requester {
        if notifier
            .send(requester_email, requester_name, subject, body_lines)
            .await
        {
            result.notified += 1;
        } else {
            result.failed += 1;
            warn!(to = %requester_email, subject, "通知投递失败（预约人）");
        }
    }

    for recipient in settings
        .staff_recipients
        .iter()
        .chain(settings.extra_recipients.iter())
    {
        if notifier.send(recipient, "", subject, body_lines).await {
            result.notified += 1;
        } else {
            result.failed += 1;
            warn!(to = %recipient, subject, "通知投递失败（角色/额外收件人）");
        }
    }

    result
}
