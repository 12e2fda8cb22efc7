//! Extraction of invoice data from the NFC-e consultation page published by the state tax authorities
//! (SEFAZ).
use {
    crate::{
        boundaries::NfeParser,
        errors::ParseError,
        httpext::FetchedDocument,
        nfe::{normalize_amount, Issuer, NfeData, NfeItem, Payment, Totals},
        soup::{collapse_whitespace, parse_html_str, NodeExt, QueryBuilderExt},
    },
    log::*,
    markup5ever_rcdom::{Handle, RcDom},
};

const ACCESS_KEY_DIGITS: usize = 44;

const ID_ITEMS_TABLE: &str = "tabResult";
const ID_TOTALS: &str = "totalNota";
const ID_PAYMENT_HEADER: &str = "linhaForma";
const ID_INFOS: &str = "infos";

const CLASS_HEADER: &str = "txtCenter";
const CLASS_ISSUER_NAME: &str = "txtTopo";
const CLASS_ISSUER_TEXT: &str = "text";
const CLASS_ITEM_NAME: &str = "txtTit";
const CLASS_ITEM_CODE: &str = "RCod";
const CLASS_ITEM_QUANTITY: &str = "Rqtd";
const CLASS_ITEM_UNIT: &str = "RUN";
const CLASS_ITEM_UNIT_PRICE: &str = "RvlUnit";
const CLASS_ITEM_TOTAL: &str = "valor";
const CLASS_TOTAL_VALUE: &str = "totalNumb";
const CLASS_PAYMENT_LABEL: &str = "tx";
const CLASS_ACCESS_KEY: &str = "chave";

const LABEL_CNPJ: &str = "CNPJ";
const LABEL_NUMBER: &str = "Número:";
const LABEL_SERIES: &str = "Série:";
const LABEL_ISSUED_AT: &str = "Emissão:";
const LABEL_MODEL: &str = "Modelo:";
const LABEL_PROTOCOL: &str = "Protocolo";
const VIA_SEPARATOR: &str = " - ";

/// Everything that can end a value in the general information line, whatever order the labels come in.
const GENERAL_INFO_TERMINATORS: &[&str] =
    &[LABEL_MODEL, LABEL_NUMBER, LABEL_SERIES, LABEL_ISSUED_AT, LABEL_PROTOCOL, VIA_SEPARATOR];
const LABEL_CHANGE: &str = "troco";

/// [`NfeParser`] for SEFAZ NFC-e consultation pages.
#[derive(Clone, Copy, Debug, Default)]
pub struct SefazNfeParser;

impl NfeParser for SefazNfeParser {
    fn extract(&self, document: &FetchedDocument) -> Result<NfeData, ParseError> {
        let url = document.requested_url();
        let text = match document.text() {
            Ok(t) => t,
            Err(e) => return Err(ParseError::new(url, format!("body is not valid UTF-8: {e}"))),
        };

        debug!("NFe page {url} has {} bytes", text.len());
        parse_nfe_page(text, url.as_str())
    }
}

/// Extract invoice data from the HTML of a consultation page.
pub(crate) fn parse_nfe_page(text: &str, source_url: &str) -> Result<NfeData, ParseError> {
    let document = parse_html_str(text);

    let access_key = find_access_key(&document).map_err(|reason| ParseError::new(source_url, reason))?;
    let issuer = find_issuer(&document).ok_or_else(|| ParseError::new(source_url, "issuer name not found"))?;
    let items = find_items(&document);
    if items.is_empty() {
        warn!("No items found in NFe {access_key} at {source_url}");
    }

    let (totals, payments) = find_totals(&document);
    let (number, series, issued_at) = find_general_info(&document);

    Ok(NfeData {
        access_key,
        number,
        series,
        issued_at,
        issuer,
        items,
        totals,
        payments,
        source_url: source_url.to_string(),
    })
}

fn find_access_key(document: &RcDom) -> Result<String, String> {
    let Some(span) = document.tag("span").class(CLASS_ACCESS_KEY).find() else {
        return Err("access key not found".to_string());
    };

    let key: String = span.text().chars().filter(|c| !c.is_whitespace()).collect();
    if key.len() != ACCESS_KEY_DIGITS || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("malformed access key {key:?}"));
    }

    Ok(key)
}

fn find_issuer(document: &RcDom) -> Option<Issuer> {
    // The issuer block is the header div holding the company name; fall back to the whole page.
    let header = document
        .tag("div")
        .class(CLASS_HEADER)
        .find_all()
        .into_iter()
        .find(|div| div.class(CLASS_ISSUER_NAME).find().is_some())
        .unwrap_or_else(|| document.document.clone());

    let name = header.class(CLASS_ISSUER_NAME).find()?.clean_text();
    if name.is_empty() {
        return None;
    }

    let mut cnpj = None;
    let mut address = None;

    for block in header.tag("div").class(CLASS_ISSUER_TEXT).find_all() {
        let text = block.clean_text();
        if let Some(rest) = text.strip_prefix(LABEL_CNPJ) {
            cnpj = non_empty(rest.trim_start_matches(':'));
        } else if address.is_none() {
            address = non_empty(&join_address(&text));
        }
    }

    if cnpj.is_none() {
        warn!("Issuer CNPJ not found for {name}");
    }

    Some(Issuer {
        name,
        cnpj,
        address,
    })
}

/// Address parts are printed comma-separated, with empty parts for missing fields.
fn join_address(text: &str) -> String {
    text.split(',').map(str::trim).filter(|part| !part.is_empty()).collect::<Vec<_>>().join(", ")
}

fn find_items(document: &RcDom) -> Vec<NfeItem> {
    let Some(table) = document.attr("id", ID_ITEMS_TABLE).find() else {
        warn!("Items table #{ID_ITEMS_TABLE} not found");
        return vec![];
    };

    let mut items = vec![];
    for tr in table.tag("tr").find_all() {
        let Some(name) = tr.tag("span").class(CLASS_ITEM_NAME).find() else {
            continue;
        };

        let code = span_text(&tr, CLASS_ITEM_CODE)
            .and_then(|code| labeled_value(code.trim_start_matches('(').trim_end_matches(')')));
        let quantity = span_text(&tr, CLASS_ITEM_QUANTITY).and_then(|q| labeled_value(&q)).and_then(amount);
        let unit = span_text(&tr, CLASS_ITEM_UNIT).and_then(|u| labeled_value(&u));
        let unit_price = span_text(&tr, CLASS_ITEM_UNIT_PRICE).and_then(|p| labeled_value(&p)).and_then(amount);
        let total_price = span_text(&tr, CLASS_ITEM_TOTAL).and_then(amount);

        items.push(NfeItem {
            code,
            description: name.clean_text(),
            quantity,
            unit,
            unit_price,
            total_price,
        });
    }

    items
}

fn find_totals(document: &RcDom) -> (Totals, Vec<Payment>) {
    let mut totals = Totals::default();
    let mut payments = vec![];

    let Some(total_nota) = document.attr("id", ID_TOTALS).find() else {
        warn!("Totals block #{ID_TOTALS} not found");
        return (totals, payments);
    };

    let mut in_payments = false;

    for row in total_nota.tag("div").find_all() {
        if row.get("id").as_deref() == Some(ID_PAYMENT_HEADER) {
            in_payments = true;
            continue;
        }

        let Some(label) = row.tag("label").find() else {
            continue;
        };
        let label_text = label.clean_text();
        let value = span_text(&row, CLASS_TOTAL_VALUE);
        let is_payment = in_payments || has_class(&label, CLASS_PAYMENT_LABEL);

        if is_payment {
            if label_text.to_lowercase().starts_with(LABEL_CHANGE) {
                totals.change = value.and_then(amount);
            } else {
                payments.push(Payment {
                    method: label_text,
                    amount: value.and_then(amount),
                });
            }
            continue;
        }

        let label_lower = label_text.to_lowercase();
        if label_lower.starts_with("qtd. total de itens") {
            totals.item_count = value.and_then(|v| v.parse().ok());
        } else if label_lower.starts_with("valor total") {
            totals.gross_amount = value.and_then(amount);
        } else if label_lower.starts_with("descontos") {
            totals.discount = value.and_then(amount);
        } else if label_lower.starts_with("valor a pagar") {
            totals.amount_due = value.and_then(amount);
        } else {
            debug!("Ignoring totals row {label_text:?}");
        }
    }

    (totals, payments)
}

fn find_general_info(document: &RcDom) -> (Option<String>, Option<String>, Option<String>) {
    let root = document.attr("id", ID_INFOS).find().unwrap_or_else(|| document.document.clone());

    let Some(text) = root.tag("li").find_all().into_iter().map(|li| li.clean_text()).find(|t| t.contains(LABEL_NUMBER))
    else {
        warn!("General information (number, series, issue date) not found");
        return (None, None, None);
    };

    let number = segment(&text, LABEL_NUMBER, GENERAL_INFO_TERMINATORS);
    let series = segment(&text, LABEL_SERIES, GENERAL_INFO_TERMINATORS);
    let issued_at = segment(&text, LABEL_ISSUED_AT, GENERAL_INFO_TERMINATORS);

    (number, series, issued_at)
}

/// The text following `label`, up to the nearest of `terminators`.
fn segment(text: &str, label: &str, terminators: &[&str]) -> Option<String> {
    let start = text.find(label)? + label.len();
    let rest = &text[start..];
    let end = terminators.iter().filter_map(|t| rest.find(t)).min().unwrap_or(rest.len());
    non_empty(&rest[..end])
}

fn span_text(node: &Handle, class: &str) -> Option<String> {
    node.tag("span").class(class).find().map(|span| span.clean_text())
}

fn has_class(node: &Handle, class: &str) -> bool {
    node.get("class").map(|classes| classes.split_ascii_whitespace().any(|c| c == class)).unwrap_or(false)
}

/// The part of `Label: value` after the first colon, or the whole text when there is no colon.
fn labeled_value(text: &str) -> Option<String> {
    let value = text.split_once(':').map(|(_, value)| value).unwrap_or(text);
    non_empty(value)
}

fn amount(text: String) -> Option<String> {
    let normalized = normalize_amount(&text);
    if normalized.is_none() {
        warn!("Unrecognized amount {text:?}");
    }
    normalized
}

fn non_empty(text: &str) -> Option<String> {
    let text = collapse_whitespace(text);
    (!text.is_empty()).then_some(text)
}
