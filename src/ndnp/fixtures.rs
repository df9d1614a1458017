//! XML samples shared by unit tests.

pub const ISSUE_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<mets xmlns="http://www.loc.gov/METS/" xmlns:mix="http://www.loc.gov/mix/" xmlns:ndnp="http://www.loc.gov/ndnp" xmlns:premis="http://www.oclc.org/premis" xmlns:mods="http://www.loc.gov/mods/v3" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xlink="http://www.w3.org/1999/xlink" LABEL="Evening News, 1923-01-05">
  <!-- digitized by the state library -->
  <dmdSec ID="issueModsBib">
    <mdWrap MDTYPE="MODS"><xmlData>
      <mods:mods>
        <mods:relatedItem type="host"><mods:identifier type="lccn">sn12345678</mods:identifier></mods:relatedItem>
        <mods:originInfo><mods:dateIssued encoding="iso8601">1923-01-05</mods:dateIssued></mods:originInfo>
      </mods:mods>
    </xmlData></mdWrap>
  </dmdSec>
  <structMap>
    <div TYPE="np:issue" DMDID="issueModsBib"/>
  </structMap>
</mets>
"#;

pub const PAGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<alto xmlns="http://schema.ccs-gmbh.com/ALTO">
  <Description><sourceImageInformation><fileName>1923-01-05 scan</fileName></sourceImageInformation></Description>
  <Layout>
    <Page ID="P1">
      <TopMargin><TextBlock><TextLine><String CONTENT="1923-01-05"/></TextLine></TextBlock></TopMargin>
      <PrintSpace>
        <!-- masthead -->
        <TextBlock ID="TB1">
          <TextLine><String CONTENT="Evening"/><SP/><String CONTENT="News"/></TextLine>
          <TextLine><String CONTENT="1923-01-05"/><String CONTENT="issued 1923-01-05."/></TextLine>
        </TextBlock>
      </PrintSpace>
    </Page>
  </Layout>
</alto>
"#;

pub const BATCH_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<batch xmlns="http://www.loc.gov/ndnp" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" name="batch_nbu_test_ver01" awardee="nbu" awardYear="2023">
	<!-- issues -->
	<issue editionOrder="01" issueDate="1923-01-05" lccn="sn12345678">sn12345678/00271763289/1923010501/1923010501.xml</issue>
	<issue editionOrder="01" issueDate="1923-01-06" lccn="sn12345678">sn12345678/00271763289/1923010601/1923010601.xml</issue>
	<issue editionOrder="01" issueDate="1923-02-01" lccn="sn22222222">sn22222222/00271763300/1923020101/1923020101.xml</issue>
	<reel reelNumber="00271763289">sn12345678/00271763289/00271763289.xml</reel>
	<reel reelNumber="00271763300">sn22222222/00271763300/00271763300.xml</reel>
</batch>
"#;
