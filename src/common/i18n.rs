// src/common/i18n.rs

// Mensagens de erro por código e idioma. Idioma desconhecido cai em "en".
pub fn message(code: &str, lang: &str) -> &'static str {
    match lang {
        "pt" => message_pt(code),
        "ru" => message_ru(code),
        _ => message_en(code),
    }
}

fn message_en(code: &str) -> &'static str {
    match code {
        "VALIDATION_ERROR" => "One or more fields are invalid.",
        "BAD_REQUEST" => "Malformed request.",
        "INVALID_CREDENTIALS" => "Invalid e-mail or password.",
        "INVALID_TOKEN" => "Authentication token is invalid or missing.",
        "NOT_FOUND" => "Resource not found.",
        "FORBIDDEN" => "You do not have access to this resource.",
        "OUT_OF_FUNNEL" => "The record does not belong to this funnel.",
        "UPSTREAM_ERROR" => "The CRM is unavailable, try again later.",
        _ => "An unexpected error occurred.",
    }
}

fn message_pt(code: &str) -> &'static str {
    match code {
        "VALIDATION_ERROR" => "Um ou mais campos são inválidos.",
        "BAD_REQUEST" => "Requisição malformada.",
        "INVALID_CREDENTIALS" => "E-mail ou senha inválidos.",
        "INVALID_TOKEN" => "Token de autenticação inválido ou ausente.",
        "NOT_FOUND" => "Recurso não encontrado.",
        "FORBIDDEN" => "Você não tem acesso a este recurso.",
        "OUT_OF_FUNNEL" => "O registro não pertence a este funil.",
        "UPSTREAM_ERROR" => "O CRM está indisponível, tente novamente mais tarde.",
        _ => "Ocorreu um erro inesperado.",
    }
}

fn message_ru(code: &str) -> &'static str {
    match code {
        "VALIDATION_ERROR" => "Одно или несколько полей заполнены неверно.",
        "BAD_REQUEST" => "Некорректный запрос.",
        "INVALID_CREDENTIALS" => "Неверный e-mail или пароль.",
        "INVALID_TOKEN" => "Токен авторизации отсутствует или недействителен.",
        "NOT_FOUND" => "Ресурс не найден.",
        "FORBIDDEN" => "Нет доступа к этому ресурсу.",
        "OUT_OF_FUNNEL" => "Запись не относится к этой воронке.",
        "UPSTREAM_ERROR" => "CRM недоступна, попробуйте позже.",
        _ => "Произошла непредвиденная ошибка.",
    }
}
