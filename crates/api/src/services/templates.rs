//! Message rendering for participant and admin notifications.
//!
//! All user-supplied text is HTML-escaped before it is embedded.

use domain::models::retreat::format_date_range;
use domain::models::{NotificationAction, NotificationRequest};
use shared::html::{escape_html, escape_or_dash};

/// Subject and HTML body of one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Header branding shared by participant emails.
#[derive(Debug, Clone, Default)]
pub struct Branding {
    pub brand_name: String,
    pub logo_url: Option<String>,
}

impl Branding {
    pub fn new(brand_name: &str, logo_url: &str) -> Self {
        Self {
            brand_name: brand_name.to_string(),
            logo_url: normalize_logo_url(logo_url),
        }
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

/// Trims a logo URL and repairs a duplicated image extension (`logo.png.png`).
pub fn normalize_logo_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    for ext in IMAGE_EXTENSIONS {
        let doubled = format!(".{ext}.{ext}");
        if lower.ends_with(&doubled) {
            return Some(trimmed[..trimmed.len() - ext.len() - 1].to_string());
        }
    }
    Some(trimmed.to_string())
}

fn looks_like_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Date line for a notification; `joiner` links the first and last day.
pub fn date_info(request: &NotificationRequest, joiner: &str) -> String {
    format_date_range(request.retreat_start, request.retreat_end, joiner)
}

fn action_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" style="display:inline-block;background:#b8860b;color:#1a1206;padding:12px 18px;border-radius:8px;text-decoration:none;font-weight:700;margin-top:12px;">{}</a>"#,
        escape_html(url),
        escape_html(label)
    )
}

fn base_template(
    branding: &Branding,
    title: &str,
    intro: &str,
    details: &str,
    action_html: &str,
    footer: &str,
) -> String {
    let logo_html = branding
        .logo_url
        .as_deref()
        .map(|url| {
            format!(
                r#"<div style="padding:20px 24px 0;"><img src="{}" alt="{}" style="max-width:180px;height:auto;display:block;margin:0 auto;" /></div>"#,
                escape_html(url),
                escape_html(&branding.brand_name)
            )
        })
        .unwrap_or_default();
    let action_block = if action_html.is_empty() {
        String::new()
    } else {
        format!("<div>{}</div>", action_html)
    };
    let footer_block = if footer.is_empty() {
        String::new()
    } else {
        format!(
            r#"<p style="margin:18px 0 0;color:#d6c39e;line-height:1.6;">{}</p>"#,
            footer
        )
    };

    format!(
        r#"<div style="background:#120d06;padding:24px 12px;font-family:Arial,sans-serif;color:#f8f3e8;">
  <div style="max-width:640px;margin:0 auto;background:#1e160b;border:1px solid #3c2b12;border-radius:12px;overflow:hidden;">
    {logo_html}
    <div style="padding:20px 24px;background:#2b1d0c;border-bottom:1px solid #3c2b12;">
      <div style="font-size:12px;letter-spacing:1px;text-transform:uppercase;color:#d5b06c;">{brand}</div>
      <h1 style="margin:8px 0 0;font-size:22px;color:#f6e4b6;">{title}</h1>
    </div>
    <div style="padding:20px 24px;">
      <p style="margin:0 0 14px;line-height:1.6;">{intro}</p>
      <div style="background:#161008;border:1px solid #3c2b12;border-radius:10px;padding:14px 16px;">
        {details}
      </div>
      {action_block}
      {footer_block}
    </div>
  </div>
</div>"#,
        brand = escape_html(&branding.brand_name),
    )
}

fn group_link_html(link: Option<&str>) -> String {
    let Some(trimmed) = link.map(str::trim).filter(|l| !l.is_empty()) else {
        return String::new();
    };

    if looks_like_http_url(trimmed) {
        return action_button(trimmed, "Entrar no grupo do WhatsApp");
    }

    format!(
        r#"<p style="margin:12px 0 0;"><strong>Grupo do WhatsApp:</strong> {}</p>"#,
        escape_html(trimmed)
    )
}

fn payment_instructions_html(instructions: Option<&str>) -> String {
    let Some(trimmed) = instructions.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };

    if looks_like_http_url(trimmed) {
        return action_button(trimmed, "Ver formas de pagamento");
    }

    format!(
        r#"<div style="margin-top:12px;background:#161008;border:1px dashed #8a6b2f;border-radius:10px;padding:12px 14px;line-height:1.6;"><strong>Instrucoes de pagamento:</strong><br/>{}</div>"#,
        escape_html(trimmed).replace('\n', "<br/>")
    )
}

/// Renders the participant email for `request.action`.
pub fn render_participant_email(request: &NotificationRequest, branding: &Branding) -> EmailContent {
    let name = escape_html(&request.participant_name);
    let details = format!(
        r#"<p style="margin:0 0 8px;"><strong>Retiro:</strong> {}</p>
        <p style="margin:0 0 8px;"><strong>Participante:</strong> {}</p>
        <p style="margin:0 0 8px;"><strong>Data:</strong> {}</p>
        <p style="margin:0;"><strong>Local:</strong> {}</p>"#,
        escape_html(&request.retreat_name),
        name,
        escape_html(&date_info(request, "até")),
        escape_or_dash(request.location.as_deref()),
    );

    match request.action {
        NotificationAction::PaymentLink => EmailContent {
            subject: format!("Formas de pagamento (Sicoob/Sipag) - {}", request.retreat_name),
            html: base_template(
                branding,
                "Formas de pagamento (Sicoob/Sipag) disponiveis",
                &format!(
                    "Ola, {}! As formas de pagamento via Sicoob/Sipag foram enviadas abaixo.",
                    name
                ),
                &details,
                &payment_instructions_html(request.payment_link.as_deref()),
                "Se precisar de ajuda, fale com a equipe organizadora.",
            ),
        },
        NotificationAction::PaymentConfirmed => {
            let action_html = group_link_html(request.whatsapp_group_link.as_deref());
            EmailContent {
                subject: format!("Pagamento confirmado - {}", request.retreat_name),
                html: base_template(
                    branding,
                    "Pagamento confirmado",
                    &format!(
                        "Pagamento confirmado, {}! Sua participacao esta garantida.",
                        name
                    ),
                    &details,
                    &action_html,
                    "Nos vemos em breve. Preparacao e coragem para essa jornada.",
                ),
            }
        }
        NotificationAction::RegistrationConfirmation => {
            let instagram = request
                .instagram_handle
                .as_deref()
                .filter(|h| !h.trim().is_empty())
                .map(|handle| {
                    format!(
                        r#"<p style="margin:10px 0 0;"><strong>Instagram:</strong> {}</p>"#,
                        escape_html(handle)
                    )
                })
                .unwrap_or_default();
            EmailContent {
                subject: format!("Inscrição recebida - {}", request.retreat_name),
                html: base_template(
                    branding,
                    "Chamado Aceito!",
                    &format!("Sua inscricao foi recebida com sucesso, {}.", name),
                    &format!("{}{}", details, instagram),
                    "",
                    "Muitos sao chamados, mas poucos tem coragem de dizer 'Sim'. Em breve voce recebera os proximos passos.",
                ),
            }
        }
    }
}

/// Free-text WhatsApp body, for actions that have one.
pub fn whatsapp_text(request: &NotificationRequest) -> Option<String> {
    let name = if request.participant_name.trim().is_empty() {
        "participante"
    } else {
        request.participant_name.as_str()
    };
    let dates = date_info(request, "ate");
    let location = request.location.as_deref().unwrap_or("-");

    match request.action {
        NotificationAction::PaymentLink => Some(
            [
                format!("Paz, {}!", name),
                String::new(),
                format!(
                    "As formas de pagamento via Sicoob/Sipag do retiro \"{}\" foram enviadas para o seu e-mail.",
                    request.retreat_name
                ),
                "Confira sua caixa de entrada e spam.".to_string(),
                String::new(),
                format!("Data: {}", dates),
                format!("Local: {}", location),
            ]
            .join("\n"),
        ),
        NotificationAction::PaymentConfirmed => {
            let group_line = request
                .whatsapp_group_link
                .as_deref()
                .filter(|l| !l.trim().is_empty())
                .map(|l| format!("Entre no grupo: {}", l));
            let lines = [
                Some(format!("Paz, {}!", name)),
                Some(format!(
                    "Pagamento confirmado para o retiro \"{}\".",
                    request.retreat_name
                )),
                Some("Sua vaga esta garantida!".to_string()),
                group_line,
                Some(format!("Data: {}", dates)),
                Some(format!("Local: {}", location)),
            ];
            Some(lines.into_iter().flatten().collect::<Vec<_>>().join("\n"))
        }
        NotificationAction::RegistrationConfirmation => None,
    }
}

/// Ordered body parameters for the pre-approved WhatsApp template.
pub fn whatsapp_template_parameters(request: &NotificationRequest) -> Vec<String> {
    let dates = date_info(request, "ate");
    match request.action {
        NotificationAction::PaymentConfirmed => vec![
            request.participant_name.clone(),
            request.retreat_name.clone(),
            request
                .whatsapp_group_link
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            dates,
        ],
        _ => vec![
            request.participant_name.clone(),
            request.retreat_name.clone(),
            dates,
            request.location.clone().unwrap_or_else(|| "-".to_string()),
        ],
    }
}

/// Email sent to the approver for a pending admin account.
pub fn render_approval_email(
    full_name: Option<&str>,
    email: &str,
    approval_link: &str,
    ttl_days: i64,
) -> EmailContent {
    let display = full_name.unwrap_or(email);
    let link = escape_html(approval_link);
    EmailContent {
        subject: format!("Nova conta aguardando aprovação - {}", display),
        html: format!(
            r#"<div style="font-family:Arial,sans-serif;color:#111;line-height:1.5;">
  <h2>Nova conta aguardando aprovação</h2>
  <p><strong>Nome:</strong> {name}</p>
  <p><strong>Email:</strong> {email}</p>
  <p>Para liberar o acesso, clique no link abaixo:</p>
  <p><a href="{link}">{link}</a></p>
  <p>Este link expira em {ttl_days} dias.</p>
</div>"#,
            name = escape_or_dash(full_name),
            email = escape_html(email),
        ),
    }
}
