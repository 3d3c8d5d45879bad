//! SOAP conversation with the store's update delivery service.
//!
//! Three calls are made: `GetCookie` for an encrypted session cookie,
//! `SyncUpdates` to list the updates in a product's category, and
//! `GetExtendedUpdateInfo2` for each update's download location. The
//! responses are matched with regular expressions rather than fully parsed.

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, SecondsFormat, Utc};
use log::debug;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::http::HttpClient;

pub const DEFAULT_DELIVERY_URL: &str = "https://fe3.delivery.mp.microsoft.com";

const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";
const SERVICE_PATH: &str = "/ClientWebService/client.asmx";
const SECURED_SERVICE_PATH: &str = "/ClientWebService/client.asmx/secured";
const ACTION_BASE: &str =
    "http://www.microsoft.com/SoftwareDistribution/Server/ClientWebService";

/// Update IDs the service expects a client to already have installed.
const INSTALLED_NON_LEAF_UPDATE_IDS: &[u32] = &[
    1, 2, 3, 11, 19, 544, 549, 2359974, 2359977, 5169044, 8788830, 23110993, 23110994,
    54341900, 54343656, 59830006, 59830007, 59830008, 60484010, 62450018, 62450019, 62450020,
    66027979, 66053150, 97657898, 98822896, 98959022, 98959023, 98959024, 98959025, 98959026,
    104433538, 104900364, 105489019, 117765322, 129905029, 130040031, 132387090, 132393049,
    133399034, 138537048, 140377312, 143747671, 158941041, 158941042, 158941043, 158941044,
    159123858, 159130928, 164836897, 164847386, 164848327, 164852241, 164852246, 164852252,
    164852253,
];

const DEVICE_ATTRIBUTES: &str = "E:BranchReadinessLevel=CBB&amp;DchuNvidiaGrfxExists=1&amp;\
ProcessorIdentifier=Intel64%20Family%206%20Model%2063%20Stepping%202&amp;CurrentBranch=rs4_release&amp;\
DataVer_RS5=1942&amp;FlightRing=Retail&amp;AttrDataVer=57&amp;InstallLanguage=en-US&amp;\
OSUILocale=en-US&amp;InstallationType=Client&amp;FlightingBranchName=&amp;Version_RS5=10&amp;\
UpgEx_RS5=Green&amp;GStatus_RS5=2&amp;OSSkuId=48&amp;App=WU&amp;InstallDate=1529700913&amp;\
ProcessorManufacturer=GenuineIntel&amp;AppVer=10.0.17134.471&amp;OSArchitecture=AMD64&amp;\
UpdateManagementGroup=2&amp;IsDeviceRetailDemo=0&amp;HidOverGattReg=C%3A%5CWINDOWS%5CSystem32%5CDriverStore%5CFileRepository%5Chidbthle.inf_amd64_467f181075371c89%5CMicrosoft.Bluetooth.Profiles.HidOverGatt.dll&amp;\
IsFlightingEnabled=0&amp;DchuIntelGrfxExists=1&amp;TelemetryLevel=1&amp;DefaultUserRegion=244&amp;\
DeferFeatureUpdatePeriodInDays=365&amp;Bios=Unknown&amp;WuClientVer=10.0.17134.471&amp;\
PausedFeatureStatus=1&amp;Steam=URL%3Asteam%20protocol&amp;Free=8to16&amp;OSVersion=10.0.17134.472&amp;\
DeviceFamily=Windows.Desktop";

static COOKIE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<EncryptedData>([^<]*)</EncryptedData>").expect("Invalid regex")
});

/// `NewUpdates/UpdateInfo`: the sync ID and the escaped identity XML.
/// `Deployment` carries an `<ID>` of its own, so only the leading one is taken.
static UPDATE_INFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<UpdateInfo>\s*<ID>(\d+)</ID>.*?<Xml>(.*?)</Xml>").expect("Invalid regex")
});

/// `ExtendedUpdateInfo/Updates/Update`: the sync ID and the escaped metadata XML.
static EXTENDED_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<Update>\s*<ID>(\d+)</ID>\s*<Xml>(.*?)</Xml>").expect("Invalid regex")
});

static IDENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<UpdateIdentity\s+UpdateID="([^"]+)"\s+RevisionNumber="(\d+)""#)
        .expect("Invalid regex")
});

static MONIKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:PackageMoniker|InstallerSpecificIdentifier)="([^"]+)""#)
        .expect("Invalid regex")
});

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Url>([^<]+)</Url>").expect("Invalid regex"));

/// One update returned by `SyncUpdates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub update_id: String,
    pub revision: String,
    /// `Name_Version_Arch_ResourceId_PublisherId`
    pub moniker: String,
}

/// Client for the delivery service rooted at `base_url`.
pub struct DeliveryClient<'a> {
    http_client: &'a HttpClient,
    base_url: &'a str,
}

impl<'a> DeliveryClient<'a> {
    pub fn new(http_client: &'a HttpClient, base_url: &'a str) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    /// Obtains the encrypted cookie required by `SyncUpdates`.
    #[tracing::instrument(skip(self))]
    pub async fn get_cookie(&self) -> Result<String> {
        let body = envelope(
            "GetCookie",
            &self.service_url(SERVICE_PATH),
            "<GetCookie xmlns=\"http://www.microsoft.com/SoftwareDistribution/Server/ClientWebService\">\
             <lastChange>2015-10-21T17:01:07.1472913Z</lastChange>\
             <currentTime>2015-10-21T17:01:07.1472913Z</currentTime>\
             <protocolVersion>1.81</protocolVersion>\
             </GetCookie>",
        );

        let response = self.post(SERVICE_PATH, &body).await?;
        extract_cookie(&response).ok_or_else(|| anyhow!("No cookie in GetCookie response"))
    }

    /// Lists the updates of the category, without duplicates.
    #[tracing::instrument(skip(self, cookie))]
    pub async fn sync_updates(&self, cookie: &str, category_id: &str) -> Result<Vec<UpdateEntry>> {
        let installed: String = INSTALLED_NON_LEAF_UPDATE_IDS
            .iter()
            .map(|id| format!("<int>{}</int>", id))
            .collect();

        let payload = format!(
            "<SyncUpdates xmlns=\"http://www.microsoft.com/SoftwareDistribution/Server/ClientWebService\">\
             <cookie><Expiration>2045-03-11T02:02:48Z</Expiration><EncryptedData>{cookie}</EncryptedData></cookie>\
             <parameters>\
             <ExpressQuery>false</ExpressQuery>\
             <InstalledNonLeafUpdateIDs>{installed}</InstalledNonLeafUpdateIDs>\
             <OtherCachedUpdateIDs/>\
             <SkipSoftwareSync>false</SkipSoftwareSync>\
             <NeedTwoGroupOutOfScopeUpdates>true</NeedTwoGroupOutOfScopeUpdates>\
             <FilterAppCategoryIds><CategoryIdentifier><Id>{category}</Id></CategoryIdentifier></FilterAppCategoryIds>\
             <TreatAppCategoryIdsAsInstalled>true</TreatAppCategoryIdsAsInstalled>\
             <AlsoPerformRegularSync>false</AlsoPerformRegularSync>\
             <ComputerSpec/>\
             <ExtendedUpdateInfoParameters>\
             <XmlUpdateFragmentTypes><XmlUpdateFragmentType>Extended</XmlUpdateFragmentType></XmlUpdateFragmentTypes>\
             <Locales><string>en-US</string><string>en</string></Locales>\
             </ExtendedUpdateInfoParameters>\
             <ClientPreferredLanguages><string>en-US</string></ClientPreferredLanguages>\
             <ProductsParameters>\
             <SyncCurrentVersionOnly>false</SyncCurrentVersionOnly>\
             <DeviceAttributes>{attributes}</DeviceAttributes>\
             <CallerAttributes>E:Interactive=1&amp;IsSeeker=1&amp;</CallerAttributes>\
             <Products/>\
             </ProductsParameters>\
             </parameters>\
             </SyncUpdates>",
            cookie = cookie,
            installed = installed,
            category = category_id,
            attributes = DEVICE_ATTRIBUTES,
        );

        let body = envelope("SyncUpdates", &self.service_url(SERVICE_PATH), &payload);
        let response = self.post(SERVICE_PATH, &body).await?;
        let entries = parse_sync_updates(&response);
        debug!("SyncUpdates returned {} package update(s)", entries.len());

        Ok(entries)
    }

    /// Returns the download URL of one update, if the service offers one.
    #[tracing::instrument(skip(self))]
    pub async fn file_url(&self, update_id: &str, revision: &str) -> Result<Option<String>> {
        let payload = format!(
            "<GetExtendedUpdateInfo2 xmlns=\"http://www.microsoft.com/SoftwareDistribution/Server/ClientWebService\">\
             <updateIDs><UpdateIdentity><UpdateID>{update_id}</UpdateID><RevisionNumber>{revision}</RevisionNumber></UpdateIdentity></updateIDs>\
             <infoTypes>\
             <XmlUpdateFragmentType>FileUrl</XmlUpdateFragmentType>\
             <XmlUpdateFragmentType>FileDecryption</XmlUpdateFragmentType>\
             <XmlUpdateFragmentType>EsrpDecryptionInformation</XmlUpdateFragmentType>\
             <XmlUpdateFragmentType>PiecesHashUrl</XmlUpdateFragmentType>\
             <XmlUpdateFragmentType>BlockMapUrl</XmlUpdateFragmentType>\
             </infoTypes>\
             <deviceAttributes>{attributes}</deviceAttributes>\
             </GetExtendedUpdateInfo2>",
            update_id = update_id,
            revision = revision,
            attributes = DEVICE_ATTRIBUTES,
        );

        let body = envelope(
            "GetExtendedUpdateInfo2",
            &self.service_url(SECURED_SERVICE_PATH),
            &payload,
        );
        let response = self.post(SECURED_SERVICE_PATH, &body).await?;

        Ok(pick_package_url(&extract_urls(&response)))
    }

    fn service_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: &str) -> Result<String> {
        let url = self.service_url(path);
        self.http_client
            .post_text(&url, SOAP_CONTENT_TYPE, body)
            .await
            .with_context(|| format!("Delivery service request to {} failed", url))
    }
}

/// Wraps a SOAP body with the addressing and anonymous ticket headers.
fn envelope(action: &str, to: &str, payload: &str) -> String {
    let now = Utc::now();
    let created = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let expires = (now + Duration::minutes(5)).to_rfc3339_opts(SecondsFormat::Millis, true);

    format!(
        "<s:Envelope xmlns:a=\"http://www.w3.org/2005/08/addressing\" xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\">\
         <s:Header>\
         <a:Action s:mustUnderstand=\"1\">{action_base}/{action}</a:Action>\
         <a:MessageID>urn:uuid:{message_id}</a:MessageID>\
         <a:To s:mustUnderstand=\"1\">{to}</a:To>\
         <o:Security s:mustUnderstand=\"1\" xmlns:o=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd\">\
         <Timestamp xmlns=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd\">\
         <Created>{created}</Created><Expires>{expires}</Expires>\
         </Timestamp>\
         <wuws:WindowsUpdateTicketsToken wsu:id=\"ClientMSA\" \
         xmlns:wsu=\"http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd\" \
         xmlns:wuws=\"http://schemas.microsoft.com/msus/2014/10/WindowsUpdateAuthorization\">\
         <TicketType Name=\"AAD\" Version=\"1.0\" Policy=\"MBI_SSL\"></TicketType>\
         </wuws:WindowsUpdateTicketsToken>\
         </o:Security>\
         </s:Header>\
         <s:Body>{payload}</s:Body>\
         </s:Envelope>",
        action_base = ACTION_BASE,
        action = action,
        message_id = Uuid::new_v4(),
        to = to,
        created = created,
        expires = expires,
        payload = payload,
    )
}

fn extract_cookie(response: &str) -> Option<String> {
    COOKIE_RE
        .captures(response)
        .map(|caps| caps[1].to_string())
        .filter(|cookie| !cookie.is_empty())
}

/// Decodes the XML entities the service uses to embed update metadata.
fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Extracts the package updates from a `SyncUpdates` response.
///
/// The response lists each update twice under the same numeric `<ID>`: its
/// identity in `NewUpdates/UpdateInfo` and its package metadata in
/// `ExtendedUpdateInfo/Updates/Update`. Updates without a package moniker
/// are not downloadable packages and are left out. The result follows the
/// `NewUpdates` order.
fn parse_sync_updates(response: &str) -> Vec<UpdateEntry> {
    let mut monikers: HashMap<&str, String> = HashMap::new();
    for caps in EXTENDED_UPDATE_RE.captures_iter(response) {
        let (Some(id), Some(xml)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let xml = unescape_xml(xml.as_str());
        if let Some(moniker) = MONIKER_RE.captures(&xml) {
            monikers
                .entry(id.as_str())
                .or_insert_with(|| moniker[1].to_string());
        }
    }

    let mut seen = HashSet::new();
    UPDATE_INFO_RE
        .captures_iter(response)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str();
            let Some(moniker) = monikers.get(id) else {
                debug!("Update {} has no package moniker", id);
                return None;
            };
            let xml = unescape_xml(caps.get(2)?.as_str());
            let identity = IDENTITY_RE.captures(&xml)?;
            Some(UpdateEntry {
                update_id: identity[1].to_string(),
                revision: identity[2].to_string(),
                moniker: moniker.clone(),
            })
        })
        .filter(|entry| seen.insert(entry.update_id.clone()))
        .collect()
}

fn extract_urls(response: &str) -> Vec<String> {
    URL_RE
        .captures_iter(response)
        .map(|caps| unescape_xml(&caps[1]))
        .collect()
}

/// Picks the package file among the returned locations.
///
/// The service also lists the block map, served unsigned; the package itself
/// is behind a signed URL carrying a `P1` query parameter. A lone unsigned
/// URL is taken as is; several unsigned ones give `None`.
fn pick_package_url(urls: &[String]) -> Option<String> {
    match urls.iter().find(|url| url.contains("P1=")) {
        Some(url) => Some(url.clone()),
        None if urls.len() == 1 => Some(urls[0].clone()),
        None => None,
    }
}
