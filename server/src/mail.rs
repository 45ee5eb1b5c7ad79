// /server/src/mail.rs
//
// Отправка почты вынесена из цикла запрос-ответ: обработчики только
// кладут сообщение в очередь, доставкой занимается фоновая задача.
// Бекенд файловый (как в режиме разработки исходного портала):
// каждое письмо сохраняется отдельным файлом в sent_mail_dir.
use std::path::PathBuf;

use tokio::sync::mpsc;

// Максимум адресатов в одном письме рассылки.
pub const CHUNK_EMAIL: usize = 50;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub subject: String,
    pub body: String,
    pub to: Vec<String>,
}

#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::UnboundedSender<MailMessage>,
}

impl MailQueue {
    /// Ставит письмо в очередь. Ошибки не возвращаются вызывающему:
    /// доставка не должна влиять на результат запроса.
    pub fn send(&self, message: MailMessage) {
        if self.tx.send(message).is_err() {
            tracing::warn!("Очередь почты закрыта, письмо потеряно");
        }
    }

    /// Рассылает одно письмо списку адресатов, разбивая его на части
    /// по CHUNK_EMAIL, чтобы ограничить объем одного сообщения.
    pub fn send_mass_mail(&self, subject: &str, body: &str, recipients: &[String]) {
        for chunk in recipients.chunks(CHUNK_EMAIL) {
            self.send(MailMessage {
                subject: subject.to_string(),
                body: body.to_string(),
                to: chunk.to_vec(),
            });
        }
    }
}

/// Запускает фоновую задачу доставки и возвращает очередь для обработчиков.
pub fn spawn_mailer(sent_mail_dir: &str) -> MailQueue {
    let (tx, mut rx) = mpsc::unbounded_channel::<MailMessage>();
    let dir = PathBuf::from(sent_mail_dir);

    tokio::spawn(async move {
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            tracing::error!("Не удалось создать каталог писем {:?}: {e}", dir);
            return;
        }
        let mut counter: u64 = 0;
        while let Some(message) = rx.recv().await {
            counter += 1;
            let path = dir.join(format!(
                "{}-{counter}.txt",
                chrono::Utc::now().timestamp()
            ));
            let contents = format!(
                "To: {}\nSubject: {}\n\n{}\n",
                message.to.join(", "),
                message.subject,
                message.body,
            );
            match tokio::fs::write(&path, contents).await {
                Ok(()) => tracing::debug!("Письмо сохранено: {:?}", path),
                Err(e) => tracing::error!("Не удалось записать письмо {:?}: {e}", path),
            }
        }
    });

    MailQueue { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (MailQueue, mpsc::UnboundedReceiver<MailMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MailQueue { tx }, rx)
    }

    #[test]
    fn mass_mail_is_chunked() {
        let (mailer, mut rx) = queue();
        let recipients: Vec<String> = (0..CHUNK_EMAIL * 2 + 1)
            .map(|i| format!("user{i}@example.ru"))
            .collect();

        mailer.send_mass_mail("Тема", "Текст", &recipients);

        let mut sizes = Vec::new();
        while let Ok(message) = rx.try_recv() {
            assert_eq!(message.subject, "Тема");
            sizes.push(message.to.len());
        }
        assert_eq!(sizes, vec![CHUNK_EMAIL, CHUNK_EMAIL, 1]);
    }

    #[test]
    fn empty_recipient_list_sends_nothing() {
        let (mailer, mut rx) = queue();
        mailer.send_mass_mail("Тема", "Текст", &[]);
        assert!(rx.try_recv().is_err());
    }
}
