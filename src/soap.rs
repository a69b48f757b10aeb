// ===============================
// src/soap.rs
// ===============================
//
// Minimal SOAP plumbing for the two legacy calls we still need
// (ForecastService.getTrafficData, UserService.getCurrentUser).
// Requests are built as strings; responses are read with quick-xml by
// local element name, ignoring namespace prefixes.
//
use chrono::{Datelike, NaiveDate};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

pub fn envelope(version: &str, network_code: &str, application_name: &str, body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns="https://www.google.com/apis/ads/publisher/{version}">"#,
            "<soapenv:Header><RequestHeader>",
            "<networkCode>{network}</networkCode>",
            "<applicationName>{app}</applicationName>",
            "</RequestHeader></soapenv:Header>",
            "<soapenv:Body>{body}</soapenv:Body>",
            "</soapenv:Envelope>"
        ),
        version = escape(version),
        network = escape(network_code),
        app = escape(application_name),
        body = body,
    )
}

fn civil_date(tag: &str, d: &NaiveDate) -> String {
    format!("<{tag}><year>{}</year><month>{}</month><day>{}</day></{tag}>", d.year(), d.month(), d.day())
}

pub fn traffic_data_body(root_ad_unit_id: &str, start: &NaiveDate, end: &NaiveDate) -> String {
    format!(
        concat!(
            "<getTrafficData><trafficDataRequest>",
            "<targeting><inventoryTargeting><targetedAdUnits>",
            "<adUnitId>{id}</adUnitId><includeDescendants>true</includeDescendants>",
            "</targetedAdUnits></inventoryTargeting></targeting>",
            "<requestedDateRange>{start}{end}</requestedDateRange>",
            "</trafficDataRequest></getTrafficData>"
        ),
        id = escape(root_ad_unit_id),
        start = civil_date("startDate", start),
        end = civil_date("endDate", end),
    )
}

pub fn current_user_body() -> &'static str {
    "<getCurrentUser/>"
}

/// Direct children of one element, text decoded (entities, CDATA).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    fields: Vec<(String, String)>,
}

impl Section {
    /// First non-empty text of a child with this local name.
    pub fn text(&self, local: &str) -> Option<&str> {
        self.all(local).find(|t| !t.is_empty())
    }

    pub fn all<'a, 'b>(&'a self, local: &'b str) -> impl Iterator<Item = &'a str> + use<'a, 'b> {
        self.fields.iter().filter(move |(n, _)| n == local).map(|(_, t)| t.as_str())
    }
}

/// First element with the given local name, namespace prefix ignored.
/// `Ok(None)` when the document has no such element.
pub fn section(xml: &str, local: &str) -> Result<Option<Section>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    // depth of the matched element, once found
    let mut inside: Option<usize> = None;
    let mut field: Option<(String, String)> = None;
    let mut fields = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match inside {
                    None if e.local_name().as_ref() == local.as_bytes() => inside = Some(depth),
                    Some(d) if depth == d + 1 => {
                        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                        field = Some((name, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match inside {
                None if e.local_name().as_ref() == local.as_bytes() => return Ok(Some(Section::default())),
                Some(d) if depth == d => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    fields.push((name, String::new()));
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&t.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::CData(c) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                match inside {
                    Some(d) if depth == d => return Ok(Some(Section { fields })),
                    Some(d) if depth == d + 1 => {
                        if let Some((name, text)) = field.take() {
                            fields.push((name, text.trim().to_string()));
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Ok(inside.map(|_| Section { fields })),
            _ => {}
        }
    }
}

/// `faultstring` of a SOAP Fault, if the response is one.
pub fn fault(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    Ok(section(xml, "Fault")?.map(|f| f.text("faultstring").unwrap_or("SOAP fault").to_string()))
}

/// `forecastedTimeSeries.values` of a getTrafficData response.
pub fn forecast_values(xml: &str) -> Result<Vec<i64>, quick_xml::Error> {
    Ok(section(xml, "forecastedTimeSeries")?
        .map(|fts| fts.all("values").filter_map(|v| v.parse::<i64>().ok()).collect())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAFFIC: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>
<getTrafficDataResponse xmlns="https://www.google.com/apis/ads/publisher/v202511"><rval>
<historicalTimeSeries><values>999</values></historicalTimeSeries>
<forecastedTimeSeries><timeSeriesDateRange/><values>1000</values><values>2345</values><values>9000</values></forecastedTimeSeries>
</rval></getTrafficDataResponse></soap:Body></soap:Envelope>"#;

    #[test]
    fn reads_forecasted_series_only() {
        assert_eq!(forecast_values(TRAFFIC).unwrap(), vec![1000, 2345, 9000]);
        assert_eq!(fault(TRAFFIC).unwrap(), None);
    }

    #[test]
    fn reads_fault_string() {
        let xml = r#"<soap:Envelope><soap:Body><soap:Fault><faultcode>soap:Server</faultcode>
<faultstring>[CommonError.FEATURE_NOT_ENABLED @ ]</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;
        assert_eq!(fault(xml).unwrap().as_deref(), Some("[CommonError.FEATURE_NOT_ENABLED @ ]"));
    }

    #[test]
    fn fault_string_in_cdata() {
        let xml = "<soap:Fault><faultstring><![CDATA[[CommonError.FEATURE_NOT_ENABLED @ ]]]></faultstring></soap:Fault>";
        assert_eq!(fault(xml).unwrap().as_deref(), Some("[CommonError.FEATURE_NOT_ENABLED @ ]"));
        assert_eq!(fault("<soap:Fault/>").unwrap().as_deref(), Some("SOAP fault"));
    }

    #[test]
    fn character_references_are_decoded() {
        let rval = section("<rval><name>O&#39;Brien &#x2014; Ads</name></rval>", "rval").unwrap().unwrap();
        assert_eq!(rval.text("name"), Some("O'Brien \u{2014} Ads"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(section("<rval><name>x</rval>", "rval").is_err());
        assert_eq!(section("<other/>", "rval").unwrap(), None);
    }

    #[test]
    fn user_fields_and_escaping() {
        let xml = "<rval><id>7</id><name>Ann &amp; Co</name><email>a@x.io</email></rval>";
        let rval = section(xml, "rval").unwrap().unwrap();
        assert_eq!(rval.text("name"), Some("Ann & Co"));
        assert_eq!(rval.text("id"), Some("7"));
        assert_eq!(rval.text("roleName"), None);
    }

    #[test]
    fn traffic_request_targets_root() {
        let d = NaiveDate::from_ymd_opt(2026, 2, 24).unwrap();
        let body = traffic_data_body("123<", &d, &d);
        assert!(body.contains("<adUnitId>123&lt;</adUnitId>"));
        assert!(body.contains("<startDate><year>2026</year><month>2</month><day>24</day></startDate>"));
        let env = envelope("v202511", "999", "gam-cli", &body);
        assert!(env.contains("<networkCode>999</networkCode>"));
        assert!(env.contains("publisher/v202511"));
    }
}
